//! The `base` crate defines the architectural value types of the
//! 36-bit instruction processor: words and their arithmetic,
//! instruction fields, addresses, access control, bank descriptors and
//! interrupts.  None of them hold engine state, so tools which only
//! need to build or inspect memory images (a loader, for example) can
//! depend on this crate without the emulator itself.

mod onescomplement;

pub mod access;
pub mod address;
pub mod bank;
pub mod collections;
pub mod instruction;
pub mod interrupt;
pub mod prelude;
pub mod subword;

#[macro_export]
macro_rules! w36 {
    ($n:expr) => {
        $crate::prelude::Word36::new::<{ $n }>()
    };
}

#[test]
fn test_w36() {
    use prelude::Word36;
    let m: Word36 = w36!(0o777_777_777_777);
    assert_eq!(m, Word36::NEGATIVE_ZERO);

    let p: Word36 = w36!(1u64 << 34);
    let q: Word36 = Word36::try_from(1u64 << 34).expect("test data should be in range");
    assert_eq!(p, q);
}
