//! Slide deck model and the markdown dialect the content generator emits.
//!
//! ```text
//! # Deck title
//! > Optional narration for the title page
//!
//! ## Slide title
//! - Bullet
//! - Bullet
//! > Narration read over this slide
//! ```

use crate::error::{PipelineError, PipelineResult};

/// Google TTS rejects requests above 5000 bytes of input.
const MAX_NARRATION_BYTES: usize = 4500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
    pub notes: Option<String>,
}

impl Slide {
    /// Text read aloud for this slide: its notes, or title and bullets.
    pub fn narration(&self) -> String {
        match &self.notes {
            Some(notes) if !notes.trim().is_empty() => notes.clone(),
            _ => {
                let mut text = self.title.clone();
                for bullet in &self.bullets {
                    text.push_str(". ");
                    text.push_str(bullet);
                }
                text
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub title: String,
    /// Narration for the title page
    pub intro: Option<String>,
    pub slides: Vec<Slide>,
}

/// One rendered page: the title page followed by one page per slide.
///
/// Document pages and narration files share this numbering, so page `n`
/// pairs with `slide_<n>.mp3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub title: String,
    pub bullets: Vec<String>,
    pub narration: String,
}

impl Deck {
    /// Parse generated markdown. A deck without slides is an error.
    pub fn parse(markdown: &str) -> PipelineResult<Self> {
        let mut title: Option<String> = None;
        let mut intro: Vec<String> = Vec::new();
        let mut slides: Vec<Slide> = Vec::new();
        let mut notes: Vec<String> = Vec::new();

        for raw in markdown.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("```") || line == "---" {
                continue;
            }

            if let Some(heading) = line.strip_prefix("## ") {
                flush_notes(slides.last_mut(), &mut notes);
                slides.push(Slide {
                    title: clean_inline(heading),
                    bullets: Vec::new(),
                    notes: None,
                });
            } else if let Some(heading) = line.strip_prefix("# ") {
                if title.is_none() {
                    title = Some(clean_inline(heading));
                }
            } else if let Some(quote) = line.strip_prefix('>') {
                let quote = clean_inline(quote);
                if quote.is_empty() {
                    continue;
                }
                if slides.is_empty() {
                    intro.push(quote);
                } else {
                    notes.push(quote);
                }
            } else if let Some(bullet) = strip_bullet(line) {
                if let Some(slide) = slides.last_mut() {
                    let bullet = clean_inline(bullet);
                    if !bullet.is_empty() {
                        slide.bullets.push(bullet);
                    }
                }
            }
            // Free text outside the dialect is ignored.
        }
        flush_notes(slides.last_mut(), &mut notes);

        if slides.is_empty() {
            return Err(PipelineError::invalid_deck(
                "generated content contains no slides",
            ));
        }

        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| slides[0].title.clone());
        let intro = if intro.is_empty() {
            None
        } else {
            Some(intro.join(" "))
        };

        Ok(Self {
            title,
            intro,
            slides,
        })
    }

    /// Title page followed by one page per slide, numbered from 1.
    pub fn pages(&self) -> Vec<Page> {
        let title_page = Page {
            number: 1,
            title: self.title.clone(),
            bullets: Vec::new(),
            narration: truncate_narration(self.intro.as_deref().unwrap_or(&self.title)),
        };

        std::iter::once(title_page)
            .chain(self.slides.iter().enumerate().map(|(i, slide)| Page {
                number: i + 2,
                title: slide.title.clone(),
                bullets: slide.bullets.clone(),
                narration: truncate_narration(&slide.narration()),
            }))
            .collect()
    }

    /// Plain text of the whole deck, used for music selection.
    pub fn plain_text(&self) -> String {
        let mut text = self.title.clone();
        for slide in &self.slides {
            text.push('\n');
            text.push_str(&slide.title);
            for bullet in &slide.bullets {
                text.push('\n');
                text.push_str(bullet);
            }
        }
        text
    }
}

fn flush_notes(slide: Option<&mut Slide>, notes: &mut Vec<String>) {
    if let Some(slide) = slide {
        if !notes.is_empty() {
            slide.notes = Some(notes.join(" "));
        }
    }
    notes.clear();
}

fn strip_bullet(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
}

/// Drop emphasis markers the model tends to add.
fn clean_inline(text: &str) -> String {
    text.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim()
        .to_string()
}

fn truncate_narration(text: &str) -> String {
    if text.len() <= MAX_NARRATION_BYTES {
        return text.to_string();
    }
    let mut end = MAX_NARRATION_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
