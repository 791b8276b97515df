//! Scalar formatting rules, grounded in `picture.c`'s `disp` and
//! `realtochar`: how a single element renders inside a sketch/diagram
//! cell, and how it renders in `display`'s self-evaluating textual form.

use crate::kind::Kind;

/// Characters that terminate a bare phrase/fault denotation early, forcing
/// the `(phrase "...")`/`(fault "...")` constructor form. `picture.c`'s
/// `ENDCHARS`.
const TERMINATOR_BYTES: &[u8] = b" ()[]{}#,;";

pub fn format_int(value: i64) -> String {
    value.to_string()
}

/// Full precision used by `display` mode (`idisplay`'s `FULLREALFORMAT`,
/// `"%.17g"` — enough significant digits to round-trip an `f64`).
pub const FULL_PRECISION: i32 = 17;
/// Default precision used by `sketch`/`diagram` (`DEFAULTREALFORMAT`, `"%g"`).
pub const DEFAULT_PRECISION: i32 = 6;

/// `realtochar`: format via a `%g`-style routine at `precision` significant
/// digits, strip the spurious leading `-` some formatters emit for exactly
/// `0.0`, then append a trailing `.` if neither `.` nor `e` appear, so
/// every rendered real scans as a real rather than an integer.
pub fn format_real_precision(value: f64, precision: i32) -> String {
    let mut s = format_g(value, precision);
    if value == 0.0 && s.starts_with('-') {
        s.remove(0);
    }
    if !s.contains('.') && !s.contains('e') {
        s.push('.');
    }
    s
}

/// [`format_real_precision`] at [`DEFAULT_PRECISION`], unless `format`
/// names something other than the default `"%g"`, in which case this
/// falls back to Rust's default float rendering rather than implementing
/// a full printf-format parser.
pub fn format_real(value: f64, format: &str) -> String {
    if format == "%g" {
        format_real_precision(value, DEFAULT_PRECISION)
    } else {
        let mut s = format!("{value}");
        if !s.contains('.') && !s.contains('e') {
            s.push('.');
        }
        s
    }
}

/// A compact approximation of C's `%g` at the given number of significant
/// digits: fixed notation unless the exponent falls outside
/// `[-4, precision)`, trailing zeros trimmed either way.
fn format_g(value: f64, precision: i32) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }
    if !value.is_finite() {
        return format!("{value}");
    }
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= precision {
        let mantissa_digits = (precision - 1).max(0) as usize;
        trim_scientific(&format!("{value:.mantissa_digits$e}"))
    } else {
        let decimals = (precision - 1 - exponent).max(0) as usize;
        trim_fixed(&format!("{value:.decimals$}"))
    }
}

fn trim_fixed(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn trim_scientific(s: &str) -> String {
    // Rust renders `1.234500e2`; C renders `1.2345e+02`. Match the mantissa
    // trimming and an explicit exponent sign; the padding width is cosmetic.
    let (mantissa, exponent) = s.split_once('e').expect("scientific notation always has an e");
    let mantissa = trim_fixed(mantissa);
    let exp_value: i32 = exponent.parse().expect("valid exponent");
    format!("{mantissa}e{}{:02}", if exp_value < 0 { "-" } else { "+" }, exp_value.abs())
}

pub fn format_bool(value: bool) -> char {
    if value {
        'l'
    } else {
        'o'
    }
}

/// Plain (sketch/no-decor) rendering of a character element: printable as
/// itself, sub-space control characters blank out.
pub fn format_char_plain(value: u8) -> char {
    if value >= b' ' {
        value as char
    } else {
        ' '
    }
}

/// `display`-mode rendering of an atomic character: printable characters
/// get a leading grave accent (the original's `` ` `` decoration so a
/// single character reads unambiguously as a char literal); unprintable
/// ones spell out `(char N)`.
pub fn format_char_display_atom(value: u8) -> String {
    if value >= b' ' {
        format!("`{}", value as char)
    } else {
        format!("(char {value})")
    }
}

/// Does `bytes` contain a terminator byte, forcing the constructor form
/// in `display` mode?
pub fn contains_terminator(bytes: &[u8]) -> bool {
    bytes.iter().any(|b| TERMINATOR_BYTES.contains(b))
}

/// Single-quoted string literal with internal quotes doubled (the
/// original's string-denotation rule).
pub fn quote_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('\'');
    for &b in bytes {
        let c = b as char;
        if c == '\'' {
            out.push_str("''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// `display`-mode denotation of a phrase or fault atom: a bare `"word` /
/// `?word` when the text is free of terminator bytes, otherwise the
/// constructor form `(phrase "...")` / `(fault "...")`.
///
/// A phrase's stored bytes are always the bare name (`make_phrase` never
/// adds the `"` sigil); a fault built via `build_fault` stores the `?`
/// baked into its bytes already (`"?conform"`), while one built directly
/// through `make_fault` may or may not. Either way the name used for the
/// denotation strips one leading `?` if present, so both paths render
/// the same.
pub fn phrase_or_fault_denotation(kind: Kind, bytes: &[u8]) -> String {
    debug_assert!(matches!(kind, Kind::Phrase | Kind::Fault));
    let name = if kind == Kind::Fault && bytes.first() == Some(&b'?') { &bytes[1..] } else { bytes };
    if name.is_empty() {
        return if kind == Kind::Phrase { "\" ".to_string() } else { "? ".to_string() };
    }
    if contains_terminator(name) {
        let keyword = if kind == Kind::Phrase { "phrase" } else { "fault" };
        format!("({keyword} {})", quote_string(name))
    } else {
        let sigil = if kind == Kind::Phrase { '"' } else { '?' };
        format!("{sigil}{}", String::from_utf8_lossy(name))
    }
}

/// Plain (sketch) rendering of a phrase/fault atom: the raw text, or a
/// single blank for an empty one.
pub fn format_phrase_fault_plain(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        " ".to_string()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_formatting_always_scans_as_a_real() {
        assert_eq!(format_real(1.0, "%g"), "1.");
        assert_eq!(format_real(0.5, "%g"), "0.5");
        assert_eq!(format_real(-0.0, "%g"), "0.");
        assert_eq!(format_real(0.0, "%g"), "0.");
    }

    #[test]
    fn large_and_small_magnitudes_use_scientific_notation() {
        let big = format_real(1.5e10, "%g");
        assert!(big.contains('e'), "{big}");
        let small = format_real(1.5e-10, "%g");
        assert!(small.contains('e'), "{small}");
    }

    #[test]
    fn phrase_with_terminator_byte_uses_constructor_form() {
        let denotation = phrase_or_fault_denotation(Kind::Phrase, b"has space");
        assert_eq!(denotation, "(phrase 'has space')");
    }

    #[test]
    fn plain_phrase_denotation_is_bare_sigil() {
        assert_eq!(phrase_or_fault_denotation(Kind::Fault, b"conform"), "?conform");
    }

    #[test]
    fn quote_string_doubles_internal_quotes() {
        assert_eq!(quote_string(b"it's"), "'it''s'");
    }
}
