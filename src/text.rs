use unicode_normalization::UnicodeNormalization;

/// Comparison key for answers: lowercase, no diacritics, single spaces, trimmed.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_diacritic(*c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn same_text(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

// Combining Diacritical Marks block.
fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_case_accents_and_spacing() {
        assert_eq!(normalize("  Pelé  "), "pele");
        assert_eq!(normalize("São\tPaulo\n FC"), "sao paulo fc");
        assert_eq!(normalize("AÇAÍ"), "acai");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in [
            "Pelé",
            "  Ñandú  Ártico ",
            "İstanbul",
            "Coração de Leão",
            "ÅNGSTRÖM",
            "x\u{0301}\u{0327}",
            "already normal",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn normalize_is_idempotent_across_latin_and_combining_blocks() {
        let latin = ('\u{00c0}'..='\u{024f}').chain('A'..='z');
        let marks: Vec<char> = ('\u{0300}'..='\u{036f}').collect();
        for c in latin {
            for s in [
                c.to_string(),
                format!(" {c}{c} \t{c}"),
                format!("{c}\u{0301}"),
                format!("{c}{}", marks.iter().collect::<String>()),
            ] {
                let once = normalize(&s);
                assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
                assert!(once.chars().all(|ch| !is_combining_diacritic(ch)));
            }
        }
        for m in marks {
            assert_eq!(normalize(&m.to_string()), "");
        }
    }

    #[test]
    fn same_text_ignores_case_diacritics_and_whitespace() {
        assert!(same_text("Pelé", "pele"));
        assert!(same_text("PELE", "  pélé "));
        assert!(same_text("Machu  Picchu", "machu picchu"));
        // precomposed vs decomposed
        assert!(same_text("caf\u{00e9}", "cafe\u{0301}"));
        assert!(!same_text("Pelé", "Pelés"));
    }
}
