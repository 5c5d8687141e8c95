//! Partial-word selection under j-field control.
//!
//! The j field of most operand-referencing instructions chooses which
//! part of the addressed word takes part in the operation.  Four of
//! the codes change meaning when quarter-word mode (DB32) is set.
use serde::Serialize;

use crate::onescomplement::word36::Word36;

/// j-field codes.
pub mod jfield {
    pub const W: u64 = 0;
    pub const H2: u64 = 1;
    pub const H1: u64 = 2;
    pub const XH2: u64 = 3;
    pub const XH1: u64 = 4;
    pub const Q2: u64 = 4;
    pub const T3: u64 = 5;
    pub const Q4: u64 = 5;
    pub const T2: u64 = 6;
    pub const Q3: u64 = 6;
    pub const T1: u64 = 7;
    pub const Q1: u64 = 7;
    pub const S6: u64 = 8;
    pub const S5: u64 = 9;
    pub const S4: u64 = 10;
    pub const S3: u64 = 11;
    pub const S2: u64 = 12;
    pub const S1: u64 = 13;
    pub const U: u64 = 14;
    pub const XU: u64 = 15;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartialWord {
    W,
    H1,
    H2,
    XH1,
    XH2,
    XT1,
    XT2,
    XT3,
    Q1,
    Q2,
    Q3,
    Q4,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
}

impl PartialWord {
    /// Decode a j field.  Returns `None` for the immediate-operand
    /// codes (U and XU), which do not select a field of a word.
    #[must_use]
    pub fn from_j(j: u64, quarter_word_mode: bool) -> Option<PartialWord> {
        use PartialWord::*;
        Some(match (j & 0o17, quarter_word_mode) {
            (jfield::W, _) => W,
            (jfield::H2, _) => H2,
            (jfield::H1, _) => H1,
            (jfield::XH2, _) => XH2,
            (4, false) => XH1,
            (4, true) => Q2,
            (5, false) => XT3,
            (5, true) => Q4,
            (6, false) => XT2,
            (6, true) => Q3,
            (7, false) => XT1,
            (7, true) => Q1,
            (jfield::S6, _) => S6,
            (jfield::S5, _) => S5,
            (jfield::S4, _) => S4,
            (jfield::S3, _) => S3,
            (jfield::S2, _) => S2,
            (jfield::S1, _) => S1,
            _ => return None,
        })
    }

    /// Pull the selected field out of `source`, right-justified and
    /// (for the X forms) sign-extended.
    #[must_use]
    pub fn extract(&self, source: Word36) -> Word36 {
        use PartialWord::*;
        match self {
            W => source,
            H1 => Word36::masked(source.h1()),
            H2 => Word36::masked(source.h2()),
            XH1 => source.xh1(),
            XH2 => source.xh2(),
            XT1 => source.xt1(),
            XT2 => source.xt2(),
            XT3 => source.xt3(),
            Q1 => Word36::masked(source.q1()),
            Q2 => Word36::masked(source.q2()),
            Q3 => Word36::masked(source.q3()),
            Q4 => Word36::masked(source.q4()),
            S1 => Word36::masked(source.s1()),
            S2 => Word36::masked(source.s2()),
            S3 => Word36::masked(source.s3()),
            S4 => Word36::masked(source.s4()),
            S5 => Word36::masked(source.s5()),
            S6 => Word36::masked(source.s6()),
        }
    }

    /// Replace the selected field of `original` with the low-order
    /// bits of `value`.  The sign-extended forms store into the same
    /// field as their unsigned counterparts.
    #[must_use]
    pub fn inject(&self, original: Word36, value: Word36) -> Word36 {
        use PartialWord::*;
        let v = value.bits();
        match self {
            W => value,
            H1 | XH1 => original.with_h1(v),
            H2 | XH2 => original.with_h2(v),
            XT1 => original.with_t1(v),
            XT2 => original.with_t2(v),
            XT3 => original.with_t3(v),
            Q1 => original.with_q1(v),
            Q2 => original.with_q2(v),
            Q3 => original.with_q3(v),
            Q4 => original.with_q4(v),
            S1 => original.with_s1(v),
            S2 => original.with_s2(v),
            S3 => original.with_s3(v),
            S4 => original.with_s4(v),
            S5 => original.with_s5(v),
            S6 => original.with_s6(v),
        }
    }
}

/// Extract under j-field control; immediate codes return the source
/// unchanged.
#[must_use]
pub fn extract_partial_word(source: Word36, j: u64, quarter_word_mode: bool) -> Word36 {
    match PartialWord::from_j(j, quarter_word_mode) {
        Some(pw) => pw.extract(source),
        None => source,
    }
}

/// Inject under j-field control; immediate codes return the original
/// unchanged.
#[must_use]
pub fn inject_partial_word(
    original: Word36,
    value: Word36,
    j: u64,
    quarter_word_mode: bool,
) -> Word36 {
    match PartialWord::from_j(j, quarter_word_mode) {
        Some(pw) => pw.inject(original, value),
        None => original,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_octal_eq {
        ($left:expr, $right:expr $(,)?) => {{
            match (&$left, &$right) {
                (left_val, right_val) => {
                    if !(*left_val == *right_val) {
                        panic!(
                            "Assertion failed: {:>#014o} != {:>#014o}",
                            left_val, right_val
                        );
                    }
                }
            }
        }};
    }

    fn w(n: u64) -> Word36 {
        Word36::try_from(n).expect("valid test data")
    }

    #[test]
    fn test_third_word_stores() {
        let a = w(0o444444_444444);
        let dest = w(0o333333_333333);
        assert_octal_eq!(inject_partial_word(dest, a, jfield::H1, false), w(0o444444_333333));
        assert_octal_eq!(inject_partial_word(dest, a, jfield::H2, false), w(0o333333_444444));
        assert_octal_eq!(inject_partial_word(dest, a, jfield::XH1, false), w(0o444444_333333));
        assert_octal_eq!(inject_partial_word(dest, a, jfield::XH2, false), w(0o333333_444444));
        assert_octal_eq!(inject_partial_word(dest, a, jfield::T1, false), w(0o4444_3333_3333));
        assert_octal_eq!(inject_partial_word(dest, a, jfield::T2, false), w(0o3333_4444_3333));
        assert_octal_eq!(inject_partial_word(dest, a, jfield::T3, false), w(0o3333_3333_4444));
    }

    #[test]
    fn test_quarter_word_mode() {
        let source = w(0o112_233_445_566);
        assert_octal_eq!(extract_partial_word(source, jfield::Q1, true), w(0o112));
        assert_octal_eq!(extract_partial_word(source, jfield::Q2, true), w(0o233));
        assert_octal_eq!(extract_partial_word(source, jfield::Q3, true), w(0o445));
        assert_octal_eq!(extract_partial_word(source, jfield::Q4, true), w(0o566));
        assert_octal_eq!(
            inject_partial_word(Word36::ZERO, w(0o777), jfield::Q3, true),
            w(0o000_000_777_000)
        );
    }

    #[test]
    fn test_sign_extended_extracts() {
        let source = w(0o400000_404040);
        assert_octal_eq!(extract_partial_word(source, jfield::XH1, false), w(0o777777_400000));
        assert_octal_eq!(extract_partial_word(source, jfield::H1, false), w(0o400000));
        assert_octal_eq!(extract_partial_word(source, jfield::T3, false), w(0o777777_774040));
        assert_octal_eq!(extract_partial_word(source, jfield::S1, false), w(0o40));
    }

    #[test]
    fn test_immediate_codes_pass_through() {
        let source = w(0o123);
        assert_eq!(PartialWord::from_j(jfield::U, false), None);
        assert_eq!(extract_partial_word(source, jfield::XU, false), source);
        assert_eq!(inject_partial_word(source, w(5), jfield::U, true), source);
    }
}
