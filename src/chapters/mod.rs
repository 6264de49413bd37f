//! Chapter definitions and conversion
//!
//! This module turns QuickTime-style text chapter lists (one `<start> <title>`
//! per line, nesting expressed by indentation) into a chapter tree, and renders
//! that tree as Matroska chapter XML for mkvmerge/mkvpropedit.

pub mod parser;
pub mod xml;

pub use parser::{parse_chapter_file, parse_chapters};
pub use xml::{write_chapter_xml, ChapterLayout};

use serde::{Deserialize, Serialize};

/// A single chapter and its sub-chapters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterNode {
    /// Start time exactly as written in the source, e.g. `00:05:00.000`
    pub start: String,
    /// Chapter title without surrounding whitespace
    pub title: String,
    /// Sub-chapters in playback order
    pub children: Vec<ChapterNode>,
}

impl ChapterNode {
    pub fn new(start: impl Into<String>, title: &str) -> Self {
        Self {
            start: start.into(),
            title: title.trim().to_string(),
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: ChapterNode) {
        self.children.push(child);
    }
}

/// A parsed chapter list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterTree {
    pub roots: Vec<ChapterNode>,
}

impl ChapterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of chapters at every depth
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first, document-order walk yielding `(depth, node)`
    pub fn iter(&self) -> ChapterIter<'_> {
        ChapterIter {
            stack: self.roots.iter().rev().map(|node| (0, node)).collect(),
        }
    }
}

/// Pre-order iterator over a [`ChapterTree`]
pub struct ChapterIter<'a> {
    stack: Vec<(usize, &'a ChapterNode)>,
}

impl<'a> Iterator for ChapterIter<'a> {
    type Item = (usize, &'a ChapterNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}
