use unidecode::unidecode;

/// Folds free text into the key space used by the name index.
///
/// Lowercases, drops everything outside `a-z` and whitespace, collapses
/// whitespace runs to a single space and trims. Applying it twice yields the
/// same string.
pub fn normalize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else if ch.is_whitespace() {
            pending_space = true;
        }
    }
    out
}

/// Sort key approximating a locale-aware comparison of display names.
///
/// Accented letters fold to their ASCII base so "Åland" sorts among the A's.
pub fn collation_key(display_name: &str) -> String {
    unidecode(display_name).to_lowercase()
}

/// Renders elapsed seconds as `mm:ss`.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_digits() {
        assert_eq!(normalize_name("  Côte d'Ivoire "), "cte divoire");
        assert_eq!(normalize_name("Guinea-Bissau"), "guineabissau");
        assert_eq!(normalize_name("St. Kitts & Nevis 2"), "st kitts nevis");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_name("United\t\tStates \n of   America"), "united states of america");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_name("a & b"), "a b");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "France",
            "  the   GAMBIA ",
            "São Tomé and Príncipe",
            "Bosnia & Herzegovina",
            "!!!",
            "",
            "x\u{00A0}y",
            "İstanbul",
        ];
        for sample in samples {
            let once = normalize_name(sample);
            assert_eq!(normalize_name(&once), once, "input {sample:?}");
        }
    }

    #[test]
    fn collation_folds_accents() {
        let mut names = vec!["Zambia", "Åland", "Albania", "Égypte"];
        names.sort_by_key(|name| collation_key(name));
        assert_eq!(names, vec!["Åland", "Albania", "Égypte", "Zambia"]);
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(6000), "100:00");
    }
}
