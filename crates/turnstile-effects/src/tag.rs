//! Type-tag matching.
//!
//! Execution reports identify objects by a full type path such as
//! `0xabc::ticketing::TicketClass` or
//! `0x2::kiosk::Listing<0xabc::ticketing::Ticket>`. Every interpretation of
//! those strings goes through this module so the matching rules live in one
//! place.
//!
//! Two rules are offered:
//!
//! - [`TagMatcher::Contains`]: substring containment. Loose: `"Ticket"`
//!   also matches `TicketClass` and any generic wrapping a ticket.
//! - [`TagMatcher::StructName`]: the struct name after the last `::` of the
//!   outer type (generic arguments stripped) must equal the pattern.
//!
//! Semantic lookups (events, classes, tickets) use `StructName`.

/// How a type tag is compared against a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatcher<'a> {
    Contains(&'a str),
    StructName(&'a str),
}

impl TagMatcher<'_> {
    #[must_use]
    pub fn matches(&self, type_tag: &str) -> bool {
        match self {
            Self::Contains(pattern) => type_tag.contains(pattern),
            Self::StructName(name) => struct_name(type_tag) == Some(*name),
        }
    }
}

/// The outer struct name of a type tag, without module path or generics.
#[must_use]
pub fn struct_name(type_tag: &str) -> Option<&str> {
    let outer = match type_tag.find('<') {
        Some(open) => &type_tag[..open],
        None => type_tag,
    };
    let (_, name) = outer.rsplit_once("::")?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_name_strips_path_and_generics() {
        assert_eq!(struct_name("0xabc::ticketing::Ticket"), Some("Ticket"));
        assert_eq!(
            struct_name("0x2::kiosk::Listing<0xabc::ticketing::Ticket>"),
            Some("Listing")
        );
        assert_eq!(struct_name("0xabc::ticketing::"), None);
        assert_eq!(struct_name("Ticket"), None);
        assert_eq!(struct_name(""), None);
    }

    #[test]
    fn contains_is_loose() {
        let m = TagMatcher::Contains("Ticket");
        assert!(m.matches("0xabc::ticketing::Ticket"));
        assert!(m.matches("0xabc::ticketing::TicketClass"));
        assert!(m.matches("0x2::transfer_policy::TransferPolicy<0xabc::ticketing::Ticket>"));
    }

    #[test]
    fn struct_name_is_exact() {
        let m = TagMatcher::StructName("Ticket");
        assert!(m.matches("0xabc::ticketing::Ticket"));
        assert!(!m.matches("0xabc::ticketing::TicketClass"));
        assert!(!m.matches("0x2::transfer_policy::TransferPolicy<0xabc::ticketing::Ticket>"));
    }

    #[test]
    fn shared_suffix_is_ambiguous_only_for_contains() {
        // Two unrelated packages defining a struct with the same name are
        // indistinguishable by name alone; callers needing package-level
        // precision should match on the full path with `Contains`.
        let a = "0xaaa::ticketing::Event";
        let b = "0xbbb::ticketing::Event";
        assert!(TagMatcher::StructName("Event").matches(a));
        assert!(TagMatcher::StructName("Event").matches(b));
        assert!(!TagMatcher::Contains("0xaaa::ticketing::Event").matches(b));
    }
}
