//! Line-list editing operations
//!
//! Every operation takes the current list and returns the new one. Callers
//! replace their list with the result, nothing is shared between calls.

use super::{BarcodeLine, LineId, Symbology};

/// Append a blank line of the default type
pub fn append(mut lines: Vec<BarcodeLine>, default_type: Symbology, id: LineId) -> Vec<BarcodeLine> {
    lines.push(BarcodeLine::blank(id, default_type));
    lines
}

/// Seed an empty list with exactly one blank line
pub fn seed_if_empty(lines: Vec<BarcodeLine>, default_type: Symbology, id: LineId) -> Vec<BarcodeLine> {
    if lines.is_empty() {
        vec![BarcodeLine::blank(id, default_type)]
    } else {
        lines
    }
}

pub fn update_text(lines: Vec<BarcodeLine>, id: LineId, text: impl Into<String>) -> Vec<BarcodeLine> {
    let text = text.into();
    map_line(lines, id, |line| line.text = text)
}

pub fn update_prefix(lines: Vec<BarcodeLine>, id: LineId, prefix: impl Into<String>) -> Vec<BarcodeLine> {
    let prefix = prefix.into();
    map_line(lines, id, |line| line.prefix = prefix)
}

pub fn update_type(lines: Vec<BarcodeLine>, id: LineId, symbology: Symbology) -> Vec<BarcodeLine> {
    map_line(lines, id, |line| line.symbology = symbology)
}

/// Remove the line with this id, keeping the others in order
pub fn delete(mut lines: Vec<BarcodeLine>, id: LineId) -> Vec<BarcodeLine> {
    lines.retain(|line| line.id != id);
    lines
}

fn map_line(mut lines: Vec<BarcodeLine>, id: LineId, edit: impl FnOnce(&mut BarcodeLine)) -> Vec<BarcodeLine> {
    if let Some(line) = lines.iter_mut().find(|line| line.id == id) {
        edit(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: u64, text: &str) -> BarcodeLine {
        BarcodeLine {
            id: LineId(id),
            text: text.to_string(),
            symbology: Symbology::Qr,
            prefix: String::new(),
        }
    }

    #[test]
    fn test_seed_empty_list() {
        let seeded = seed_if_empty(Vec::new(), Symbology::Code128, LineId(10));
        assert_eq!(seeded, vec![BarcodeLine::blank(LineId(10), Symbology::Code128)]);
        assert!(seeded[0].text.is_empty());
        assert!(seeded[0].prefix.is_empty());
    }

    #[test]
    fn test_seed_leaves_existing_lines() {
        let lines = vec![line(1, "A"), line(2, "B")];
        assert_eq!(seed_if_empty(lines.clone(), Symbology::Code128, LineId(3)), lines);
    }

    #[test]
    fn test_append_preserves_prior_lines() {
        let lines = vec![line(1, "A"), line(2, "B")];
        let grown = append(lines.clone(), Symbology::Code128, LineId(3));

        assert_eq!(grown.len(), 3);
        assert_eq!(&grown[..2], &lines[..]);
        assert_eq!(grown[2], BarcodeLine::blank(LineId(3), Symbology::Code128));
    }

    #[test]
    fn test_update_touches_only_target_field() {
        let lines = vec![line(1, "A"), line(2, "B")];

        let edited = update_text(lines.clone(), LineId(2), "Z");
        assert_eq!(edited[0], lines[0]);
        assert_eq!(edited[1].text, "Z");
        assert_eq!(edited[1].prefix, lines[1].prefix);
        assert_eq!(edited[1].symbology, lines[1].symbology);

        let edited = update_prefix(lines.clone(), LineId(1), "P-");
        assert_eq!(edited[0].prefix, "P-");
        assert_eq!(edited[0].text, "A");
        assert_eq!(edited[1], lines[1]);

        let edited = update_type(lines.clone(), LineId(1), Symbology::Code128);
        assert_eq!(edited[0].symbology, Symbology::Code128);
        assert_eq!(edited[0].text, "A");
        assert_eq!(edited[1], lines[1]);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let lines = vec![line(1, "A")];
        assert_eq!(update_text(lines.clone(), LineId(99), "Z"), lines);
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let lines = vec![line(1, "A"), line(2, "B"), line(3, "C")];
        let remaining = delete(lines, LineId(2));
        let ids: Vec<u64> = remaining.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_delete_last_line_leaves_empty_list() {
        let lines = vec![line(1, "A")];
        assert!(delete(lines, LineId(1)).is_empty());
    }
}
