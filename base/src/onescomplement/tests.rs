use super::double::DoubleWord36;
use super::word36::Word36;
use super::{sign_extend_12, sign_extend_18, sign_extend_24, Sign, WordCommon};

use test_strategy::{proptest, Arbitrary};

fn w(bits: u64) -> Word36 {
    Word36::try_from(bits).expect("valid test data")
}

#[test]
fn test_zeroes() {
    assert!(Word36::ZERO.is_zero());
    assert!(Word36::NEGATIVE_ZERO.is_zero());
    assert!(Word36::NEGATIVE_ZERO.is_negative());
    assert_eq!(Word36::NEGATIVE_ZERO.eliminate_negative_zero(), Word36::ZERO);
    assert_eq!(Word36::ZERO.negate(), Word36::NEGATIVE_ZERO);
    assert!(matches!(Word36::NEGATIVE_ZERO.signum(), Sign::Zero));
}

#[test]
fn test_add_simple() {
    assert_eq!(w(1).add_simple(w(2)), w(3));
    assert_eq!(w(1).add_simple(Word36::NEGATIVE_ONE), Word36::ZERO);
    assert_eq!(
        Word36::NEGATIVE_ONE.add_simple(Word36::ZERO),
        Word36::NEGATIVE_ONE
    );
    assert_eq!(
        Word36::NEGATIVE_ZERO.add_simple(Word36::NEGATIVE_ZERO),
        Word36::NEGATIVE_ZERO
    );
    assert_eq!(Word36::NEGATIVE_ZERO.add_simple(Word36::ZERO), Word36::ZERO);
    // -5 + -3 = -8
    assert_eq!(w(5).negate().add_simple(w(3).negate()), w(8).negate());
}

#[test]
fn test_add_flags() {
    let r = Word36::MAX.add_with_flags(Word36::ONE);
    assert!(r.overflow);
    assert!(!r.carry);
    let r = w(5).add_with_flags(w(3).negate());
    assert_eq!(r.sum, w(2));
    assert!(r.carry);
    assert!(!r.overflow);
    let r = w(5).negate().add_with_flags(w(3).negate());
    assert!(r.carry);
    assert!(!r.overflow);
}

#[test]
fn test_compare() {
    assert!(Word36::NEGATIVE_ZERO < Word36::ZERO);
    assert!(Word36::NEGATIVE_ONE < Word36::NEGATIVE_ZERO);
    assert!(w(1) > Word36::ZERO);
    assert!(Word36::MIN < Word36::MAX);
}

#[test]
fn test_shifts() {
    assert_eq!(w(0o123).left_shift_logical(36), Word36::ZERO);
    assert_eq!(w(0o123).right_shift_logical(36), Word36::ZERO);
    assert_eq!(w(0o400_000_000_001).left_shift_circular(1), w(0o000_000_000_003));
    assert_eq!(w(0o400_000_000_001).right_shift_circular(1), w(0o600_000_000_000));
    assert_eq!(w(0o400_000_000_000).right_shift_algebraic(3), w(0o740_000_000_000));
    assert_eq!(w(0o400_000_000_000).right_shift_algebraic(35), Word36::NEGATIVE_ZERO);
    assert_eq!(w(0o377_777_777_777).right_shift_algebraic(40), Word36::ZERO);
    assert_eq!(w(0o123).left_shift_circular(72), w(0o123));
}

#[test]
fn test_partial_words() {
    let v = w(0o112233_445566);
    assert_eq!(v.h1(), 0o112233);
    assert_eq!(v.h2(), 0o445566);
    assert_eq!(v.q1(), 0o112);
    assert_eq!(v.q2(), 0o233);
    assert_eq!(v.q3(), 0o445);
    assert_eq!(v.q4(), 0o566);
    assert_eq!(v.s1(), 0o11);
    assert_eq!(v.s6(), 0o66);
    assert_eq!(v.t1(), 0o1122);
    assert_eq!(v.t2(), 0o3344);
    assert_eq!(v.t3(), 0o5566);
    assert_eq!(v.xh2(), w(0o777777_445566));
    assert_eq!(v.xh1(), w(0o112233));
    assert_eq!(v.xt3(), w(0o777777_775566));
    assert_eq!(Word36::ZERO.with_t2(0o7777), w(0o000077_770000));
}

#[test]
fn test_sign_extension() {
    assert_eq!(sign_extend_12(0o4000), 0o777777_774000);
    assert_eq!(sign_extend_12(0o3777), 0o3777);
    assert_eq!(sign_extend_18(0o400000), 0o777777_400000);
    assert_eq!(sign_extend_24(0o40_000000), 0o777740_000000);
}

#[test]
fn test_multiply() {
    let p = DoubleWord36::multiply(w(3), w(5).negate());
    assert_eq!(p.to_i128(), -15);
    let p = DoubleWord36::multiply(Word36::MAX, Word36::MAX);
    assert_eq!(p.to_i128(), (Word36::MAX.bits() as i128).pow(2));
}

#[test]
fn test_divide() {
    let dividend = DoubleWord36::new(Word36::ZERO, w(17));
    let r = dividend.divide(w(5));
    assert_eq!(r.quotient, w(3));
    assert_eq!(r.remainder, w(2));
    assert!(!r.overflow && !r.divide_by_zero);

    let r = dividend.negate().divide(w(5));
    assert_eq!(r.quotient, w(3).negate());
    assert_eq!(r.remainder, w(2).negate());

    assert!(dividend.divide(Word36::NEGATIVE_ZERO).divide_by_zero);
    let big = DoubleWord36::new(w(1), Word36::ZERO);
    assert!(big.divide(w(1)).overflow);
}

#[test]
fn test_double_zero() {
    let pz = DoubleWord36::new(Word36::ZERO, Word36::ZERO);
    let nz = DoubleWord36::new(Word36::NEGATIVE_ZERO, Word36::NEGATIVE_ZERO);
    assert!(pz.is_zero());
    assert!(nz.is_zero());
    assert!(!DoubleWord36::new(Word36::ZERO, Word36::ONE).is_zero());
    assert!(!DoubleWord36::new(Word36::NEGATIVE_ZERO, Word36::ZERO).is_zero());
}

#[test]
fn test_double_shifts() {
    let d = DoubleWord36::new(w(0o1), w(0o400_000_000_000));
    assert_eq!(d.left_shift_circular(36), DoubleWord36::new(w(0o400_000_000_000), w(1)));
    assert_eq!(d.left_shift_logical(72), DoubleWord36::ZERO);
    assert_eq!(d.right_shift_logical(1).low, w(0o600_000_000_000));
    let n = DoubleWord36::new(Word36::MIN, Word36::ZERO);
    assert_eq!(n.right_shift_algebraic(36).high, Word36::NEGATIVE_ZERO);
}

#[derive(Debug, Arbitrary)]
struct TwoWords {
    #[strategy(0..=Word36::MASK)]
    a: u64,
    #[strategy(0..=Word36::MASK)]
    b: u64,
}

#[proptest]
fn addition_is_reversible_without_overflow(input: TwoWords) {
    let a = w(input.a);
    let b = w(input.b);
    let r = a.add_with_flags(b);
    if !r.overflow {
        let back = r.sum.add_simple(b.negate());
        assert_eq!(back.to_i64(), a.to_i64());
    }
}

#[proptest]
fn negative_zero_is_least_zero(#[strategy(0..=Word36::MASK)] bits: u64) {
    let v = w(bits);
    if v == Word36::NEGATIVE_ZERO {
        assert_eq!(Word36::NEGATIVE_ZERO.cmp(&v), std::cmp::Ordering::Equal);
    } else if v.is_negative() {
        assert!(v < Word36::NEGATIVE_ZERO);
    } else {
        assert!(Word36::NEGATIVE_ZERO < v);
    }
}

#[proptest]
fn long_logical_shifts_clear_the_word(
    #[strategy(0..=Word36::MASK)] bits: u64,
    #[strategy(36u32..200)] count: u32,
) {
    let v = w(bits);
    assert_eq!(v.left_shift_logical(count), Word36::ZERO);
    assert_eq!(v.right_shift_logical(count), Word36::ZERO);
}

#[proptest]
fn partial_word_set_then_get(input: TwoWords) {
    let word = w(input.a);
    let v = input.b;
    assert_eq!(word.with_h1(v).h1(), v & 0o777777);
    assert_eq!(word.with_h2(v).h2(), v & 0o777777);
    assert_eq!(word.with_q1(v).q1(), v & 0o777);
    assert_eq!(word.with_q2(v).q2(), v & 0o777);
    assert_eq!(word.with_q3(v).q3(), v & 0o777);
    assert_eq!(word.with_q4(v).q4(), v & 0o777);
    assert_eq!(word.with_s1(v).s1(), v & 0o77);
    assert_eq!(word.with_s2(v).s2(), v & 0o77);
    assert_eq!(word.with_s3(v).s3(), v & 0o77);
    assert_eq!(word.with_s4(v).s4(), v & 0o77);
    assert_eq!(word.with_s5(v).s5(), v & 0o77);
    assert_eq!(word.with_s6(v).s6(), v & 0o77);
    assert_eq!(word.with_t1(v).t1(), v & 0o7777);
    assert_eq!(word.with_t2(v).t2(), v & 0o7777);
    assert_eq!(word.with_t3(v).t3(), v & 0o7777);
}

#[proptest]
fn partial_word_get_then_set(#[strategy(0..=Word36::MASK)] bits: u64) {
    let word = w(bits);
    assert_eq!(word.with_h1(word.h1()), word);
    assert_eq!(word.with_h2(word.h2()), word);
    assert_eq!(word.with_q1(word.q1()), word);
    assert_eq!(word.with_q4(word.q4()), word);
    assert_eq!(word.with_s3(word.s3()), word);
    assert_eq!(word.with_t2(word.t2()), word);
}

#[proptest]
fn multiply_matches_native(
    #[strategy(-(1i64 << 34)..(1i64 << 34))] a: i64,
    #[strategy(-(1i64 << 34)..(1i64 << 34))] b: i64,
) {
    let wa = Word36::from_i64_wrapping(a);
    let wb = Word36::from_i64_wrapping(b);
    let product = DoubleWord36::multiply(wa, wb);
    assert_eq!(product.to_i128(), i128::from(a) * i128::from(b));
}
