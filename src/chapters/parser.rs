//! Text chapter list parsing
use super::{ChapterNode, ChapterTree};
use crate::error::{MkabookError, Result};
use std::path::Path;
use tracing::debug;

/// Four spaces count as one level of indentation
const INDENT_UNIT: &str = "    ";

/// Parse a chapter list file from disk
pub async fn parse_chapter_file(path: &Path) -> Result<ChapterTree> {
    let content = tokio::fs::read_to_string(path).await?;
    let tree = parse_chapters(&content)?;
    debug!("📖 Parsed {} chapters from {}", tree.len(), path.display());
    Ok(tree)
}

/// Parse a chapter list.
///
/// Every line is `<start><space><title>`. Leading runs of four spaces (or tabs)
/// in the title give the nesting depth. A line attaches under the deepest
/// chapter still open above it, so skipping levels is allowed.
pub fn parse_chapters(content: &str) -> Result<ChapterTree> {
    let mut tree = ChapterTree::new();
    // Open ancestors, outermost first. A node is attached to its parent when popped.
    let mut open: Vec<ChapterNode> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (start, title) = line
            .split_once(' ')
            .ok_or_else(|| MkabookError::MalformedChapterLine {
                line_number: index + 1,
                line: line.to_string(),
            })?;

        let level = indent_level(title);
        while open.len() > level {
            close_deepest(&mut open, &mut tree);
        }

        open.push(ChapterNode::new(start, title));
    }

    while !open.is_empty() {
        close_deepest(&mut open, &mut tree);
    }

    Ok(tree)
}

/// Number of leading indentation units once four-space runs become tabs
fn indent_level(title: &str) -> usize {
    title
        .replace(INDENT_UNIT, "\t")
        .chars()
        .take_while(|c| *c == '\t')
        .count()
}

fn close_deepest(open: &mut Vec<ChapterNode>, tree: &mut ChapterTree) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.add_child(node),
            None => tree.roots.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(tree: &ChapterTree) -> Vec<(usize, String)> {
        tree.iter()
            .map(|(depth, node)| (depth, node.title.clone()))
            .collect()
    }

    #[test]
    fn test_three_levels_nest_into_one_root() {
        let tree = parse_chapters(
            "00:00:00 Intro\n00:05:00     Chapter 1\n00:10:00         Sub A\n",
        )
        .unwrap();

        assert_eq!(tree.roots.len(), 1);
        let intro = &tree.roots[0];
        assert_eq!(intro.title, "Intro");
        assert_eq!(intro.children.len(), 1);
        assert_eq!(intro.children[0].title, "Chapter 1");
        assert_eq!(intro.children[0].start, "00:05:00");
        assert_eq!(intro.children[0].children[0].title, "Sub A");
        assert!(intro.children[0].children[0].children.is_empty());
    }

    #[test]
    fn test_depth_zero_lines_start_new_roots() {
        let tree = parse_chapters(
            "00:00:00.000 Prologue\n00:01:00.000 One\n00:01:30.000     One.a\n00:02:00.000 Two\n",
        )
        .unwrap();

        assert_eq!(tree.roots.len(), 3);
        assert_eq!(
            titles(&tree),
            vec![
                (0, "Prologue".to_string()),
                (0, "One".to_string()),
                (1, "One.a".to_string()),
                (0, "Two".to_string()),
            ]
        );
    }

    #[test]
    fn test_returning_to_shallower_level_pops_ancestors() {
        let tree = parse_chapters(
            "0 A\n1     B\n2         C\n3     D\n4 E\n",
        )
        .unwrap();

        assert_eq!(tree.roots.len(), 2);
        let a = &tree.roots[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].title, "B");
        assert_eq!(a.children[0].children[0].title, "C");
        assert_eq!(a.children[1].title, "D");
        assert_eq!(tree.roots[1].title, "E");
    }

    #[test]
    fn test_skipped_levels_attach_to_deepest_open_chapter() {
        let tree = parse_chapters("0 A\n1             Deep\n2     B\n").unwrap();

        let a = &tree.roots[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].title, "Deep");
        assert_eq!(a.children[1].title, "B");
    }

    #[test]
    fn test_indented_first_line_is_still_a_root() {
        let tree = parse_chapters("0     Orphan\n1 Next\n").unwrap();
        assert_eq!(tree.roots.len(), 2);
        assert_eq!(tree.roots[0].title, "Orphan");
    }

    #[test]
    fn test_tabs_and_crlf_are_accepted() {
        let tree = parse_chapters("0 A\r\n1 \tB\r\n").unwrap();
        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.roots[0].children[0].title, "B");
    }

    #[test]
    fn test_start_time_is_kept_verbatim() {
        let tree = parse_chapters("not-a-time Whatever\n").unwrap();
        assert_eq!(tree.roots[0].start, "not-a-time");
    }

    #[test]
    fn test_empty_document_yields_empty_tree() {
        assert!(parse_chapters("").unwrap().is_empty());
        assert!(parse_chapters("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_line_without_space_is_malformed() {
        let err = parse_chapters("00:00:00 Intro\n00:05:00\n").unwrap_err();
        match err {
            MkabookError::MalformedChapterLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "00:05:00");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_indent_level_counts_only_leading_units() {
        assert_eq!(indent_level("Intro"), 0);
        assert_eq!(indent_level("    Intro"), 1);
        assert_eq!(indent_level("        Intro    Part"), 2);
        assert_eq!(indent_level("     Intro"), 1);
    }

    #[tokio::test]
    async fn test_parse_chapter_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chapters.txt");
        tokio::fs::write(&path, "00:00:00 Intro\n00:05:00     Chapter 1\n")
            .await
            .unwrap();

        let tree = parse_chapter_file(&path).await.unwrap();
        assert_eq!(tree.len(), 2);
    }
}
