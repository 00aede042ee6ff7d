use anyhow::{anyhow, Result};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Subtitle servers report languages inconsistently: ISO 639-1 (`fa`),
/// ISO 639-2/T (`fas`), ISO 639-2/B (`per`) or a regional tag (`pt-BR`).
/// These helpers compare and describe such codes.

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Primary subtag of a language tag, lowercased (`pt-BR` -> `pt`)
fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Region subtag of a language tag, uppercased (`pt-br` -> `BR`)
fn region_subtag(code: &str) -> Option<String> {
    code.trim()
        .split(['-', '_'])
        .nth(1)
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_uppercase)
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let primary = primary_subtag(code);

    match primary.len() {
        2 => Language::from_639_1(&primary)
            .map(|lang| lang.to_639_3().to_string())
            .ok_or_else(|| anyhow!("Unknown ISO 639-1 language code: {}", code)),
        3 => {
            if let Some((_, part2t)) = PART2B_TO_PART2T.iter().find(|(b, _)| *b == primary) {
                return Ok(part2t.to_string());
            }
            Language::from_639_3(&primary)
                .map(|_| primary.clone())
                .ok_or_else(|| anyhow!("Unknown ISO 639-2 language code: {}", code))
        }
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Check if two language codes represent the same language
///
/// ISO aliases match (`fa`, `fas`, `per`), but region subtags must agree:
/// `pt-BR` matches `por-br` and differs from `pt-PT` and from plain `pt`.
/// Unknown codes only match when they are textually equal, ignoring case.
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    if code1.trim().eq_ignore_ascii_case(code2.trim()) {
        return true;
    }
    if region_subtag(code1) != region_subtag(code2) {
        return false;
    }
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Display label like `Persian (fa)`, or the bare code when unknown
pub fn display_label(code: &str) -> String {
    match get_language_name(code) {
        Ok(name) => format!("{} ({})", name, code.trim()),
        Err(_) => code.trim().to_string(),
    }
}
