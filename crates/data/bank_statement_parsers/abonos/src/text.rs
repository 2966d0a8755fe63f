//! Text folding shared by the detector and the header resolver.

/// Lowercase, accent-free, single-spaced form of `s`.
pub fn fold(s: &str) -> String {
    let lowered = s.replace('\u{00a0}', " ").to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        out.push(match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        });
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`fold`] with spaces, hyphens and underscores removed.
pub fn compact(s: &str) -> String {
    fold(s)
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Only the letters and digits of the folded text, e.g. `"No."` -> `"no"`.
pub fn alnum(s: &str) -> String {
    fold(s).chars().filter(|c| c.is_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_removes_accents_and_case() {
        assert_eq!(fold("  Situación "), "situacion");
        assert_eq!(fold("Cuenta -  Número"), "cuenta - numero");
        assert_eq!(fold("AÑO\u{00a0}Fiscal"), "ano fiscal");
    }

    #[test]
    fn test_compact_and_alnum() {
        assert_eq!(compact("Titular (Archivo)"), "titular(archivo)");
        assert_eq!(compact("Monto - Moneda"), "montomoneda");
        assert_eq!(alnum("No."), "no");
        assert_eq!(alnum("N°"), "n");
    }
}
