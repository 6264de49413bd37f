//! Matroska chapter XML rendering.
//!
//! mkvmerge and mkvpropedit both accept this document through `--chapters`.

use super::{ChapterNode, ChapterTree};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const XML_HEADER: &str = "<?xml version=\"1.0\"?>\n\
<!-- <!DOCTYPE Chapters SYSTEM \"matroskachapters.dtd\"> -->\n\
<Chapters>\n  <EditionEntry>\n";

pub const XML_FOOTER: &str = "  </EditionEntry>\n</Chapters>\n";

const CHAPTER_LANGUAGE: &str = "eng";

/// How sub-chapters are expressed in the generated XML
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChapterLayout {
    /// Every chapter is a top-level atom; depth shows as tab-prefixed titles
    #[default]
    Flattened,
    /// Sub-chapters are real nested `ChapterAtom` elements
    Nested,
}

impl ChapterLayout {
    pub fn from_sub_chapters(use_sub_chapters: bool) -> Self {
        if use_sub_chapters {
            Self::Nested
        } else {
            Self::Flattened
        }
    }
}

impl ChapterTree {
    /// Render the tree as a complete chapter XML document
    pub fn to_xml(&self, layout: ChapterLayout) -> String {
        let mut xml = String::from(XML_HEADER);
        for chapter in &self.roots {
            match layout {
                ChapterLayout::Nested => write_nested(&mut xml, chapter, 0),
                ChapterLayout::Flattened => write_flattened(&mut xml, chapter, 0),
            }
        }
        xml.push_str(XML_FOOTER);
        xml
    }
}

/// Write chapter XML for `tree` to `path`
pub async fn write_chapter_xml(tree: &ChapterTree, layout: ChapterLayout, path: &Path) -> Result<()> {
    tokio::fs::write(path, tree.to_xml(layout)).await?;
    Ok(())
}

fn write_nested(xml: &mut String, chapter: &ChapterNode, depth: usize) {
    let pad = atom_padding(depth);
    open_atom(xml, &pad, &chapter.start, &chapter.title);
    for child in &chapter.children {
        write_nested(xml, child, depth + 1);
    }
    close_atom(xml, &pad);
}

fn write_flattened(xml: &mut String, chapter: &ChapterNode, depth: usize) {
    let pad = atom_padding(0);
    let title = format!("{}{}", "\t".repeat(depth), chapter.title);
    open_atom(xml, &pad, &chapter.start, &title);
    close_atom(xml, &pad);
    for child in &chapter.children {
        write_flattened(xml, child, depth + 1);
    }
}

fn atom_padding(depth: usize) -> String {
    "  ".repeat(depth + 2)
}

fn open_atom(xml: &mut String, pad: &str, start: &str, title: &str) {
    xml.push_str(&format!("{pad}<ChapterAtom>\n"));
    xml.push_str(&format!(
        "{pad}  <ChapterTimeStart>{}</ChapterTimeStart>\n",
        escape_xml(start)
    ));
    xml.push_str(&format!("{pad}  <ChapterDisplay>\n"));
    xml.push_str(&format!(
        "{pad}    <ChapterString>{}</ChapterString>\n",
        escape_xml(title)
    ));
    xml.push_str(&format!(
        "{pad}    <ChapterLanguage>{CHAPTER_LANGUAGE}</ChapterLanguage>\n"
    ));
    xml.push_str(&format!("{pad}  </ChapterDisplay>\n"));
}

fn close_atom(xml: &mut String, pad: &str) {
    xml.push_str(&format!("{pad}</ChapterAtom>\n"));
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
