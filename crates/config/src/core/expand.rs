//! `${...}` variable expansion across a source's sections
//!
//! Two token forms are recognized inside setting values:
//!
//! - `${key}` resolves against the section the value lives in;
//! - `${sectionName|key}` resolves against the named section of the same
//!   source.
//!
//! Each value is scanned left to right and every token is substituted with
//! the referenced setting's current value. Substituted text is not
//! rescanned (one level of substitution per token occurrence), but chained
//! references resolve correctly because the referenced entry is itself
//! expanded (and written back) before its value is spliced in. References
//! to unknown sections or keys expand to the empty string. Reference
//! cycles terminate: every token participating in a cycle is left literally
//! in place. There is no escaping mechanism, so a literal `${` cannot be
//! preserved.

use indexmap::IndexMap;
use tracing::trace;

use crate::core::section::Section;

const TOKEN_OPEN: &str = "${";
const TOKEN_CLOSE: char = '}';

/// Expand every value of every section in place.
pub(crate) fn expand_all(sections: &IndexMap<String, Section>) {
    let mut visiting = Vec::new();
    for (name, section) in sections {
        for key in section.keys() {
            expand_entry(sections, name, &key, &mut visiting);
        }
        debug_assert!(visiting.is_empty());
    }
}

/// Expand a single entry, write the result back, and return it together
/// with a flag saying whether expansion completed without hitting a cycle.
///
/// Entries that are part of a cycle keep their own token text, so the
/// operation is a no-op for them rather than an error.
fn expand_entry(
    sections: &IndexMap<String, Section>,
    section_name: &str,
    key: &str,
    visiting: &mut Vec<(String, String)>,
) -> (String, bool) {
    let Some(section) = sections.get(section_name) else {
        return (String::new(), true);
    };
    let Some(raw) = section.raw(key) else {
        return (String::new(), true);
    };
    if !raw.contains(TOKEN_OPEN) {
        return (raw, true);
    }

    visiting.push((section_name.to_string(), key.to_string()));
    let mut out = String::with_capacity(raw.len());
    let mut complete = true;
    let mut rest = raw.as_str();

    while let Some(start) = rest.find(TOKEN_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + TOKEN_OPEN.len()..];
        let Some(end) = after.find(TOKEN_CLOSE) else {
            // Unterminated token: keep the tail verbatim.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let token = &after[..end];
        let literal = &rest[start..start + TOKEN_OPEN.len() + end + 1];
        let (target_section, target_key) = match token.split_once('|') {
            Some((section, key)) => (section, key),
            None => (section_name, token),
        };

        let in_cycle = visiting
            .iter()
            .any(|(s, k)| s == target_section && k == target_key);
        if in_cycle {
            trace!(
                section = section_name,
                key,
                token = literal,
                "reference cycle; token left unexpanded"
            );
            out.push_str(literal);
            complete = false;
        } else if sections.contains_key(target_section) {
            let (replacement, target_complete) =
                expand_entry(sections, target_section, target_key, visiting);
            if target_complete {
                out.push_str(&replacement);
            } else {
                // The target is tangled in a cycle; substituting its partial
                // value would smear foreign tokens into this entry. Keep our
                // own token instead.
                out.push_str(literal);
                complete = false;
            }
        }
        // Unknown section: the token expands to the empty string.

        rest = &after[end + 1..];
    }
    out.push_str(rest);
    visiting.pop();

    section.set_raw(key, out.clone());
    (out, complete)
}
