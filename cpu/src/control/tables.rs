//! Function code decoding.
//!
//! Each execution mode has a 64-entry primary table indexed by the f
//! field.  An entry is either a handler or a 16-entry secondary table
//! indexed by j or by a (and a few secondary entries lead to a third
//! level indexed by a).
use base::prelude::*;

use super::{Handler, InstructionEngine as E};

#[derive(Clone, Copy)]
enum Decode {
    Invalid,
    Op(Handler),
    ByJ(&'static [Decode; 16]),
    ByA(&'static [Decode; 16]),
}

use Decode::{ByA, ByJ, Invalid, Op};

const fn sub(entries: &[(u64, Decode)]) -> [Decode; 16] {
    let mut table = [Invalid; 16];
    let mut n = 0;
    while n < entries.len() {
        table[entries[n].0 as usize] = entries[n].1;
        n += 1;
    }
    table
}

const fn primary(entries: &[(u64, Decode)]) -> [Decode; 64] {
    let mut table = [Invalid; 64];
    let mut n = 0;
    while n < entries.len() {
        table[entries[n].0 as usize] = entries[n].1;
        n += 1;
    }
    table
}

// Tables shared by both modes.

static STORE_CONSTANT: [Decode; 16] = sub(&[
    (0o00, Op(E::op_sz)),
    (0o01, Op(E::op_snz)),
    (0o02, Op(E::op_sp1)),
    (0o03, Op(E::op_sn1)),
    (0o04, Op(E::op_sfs)),
    (0o05, Op(E::op_sfz)),
    (0o06, Op(E::op_sas)),
    (0o07, Op(E::op_saz)),
]);

// Basic mode.

static BASIC_007: [Decode; 16] = sub(&[
    (0o04, Op(E::op_laqw)),
    (0o05, Op(E::op_saqw)),
    (0o12, Op(E::op_ldj)),
    (0o13, Op(E::op_lij)),
    (0o14, Op(E::op_lpd)),
    (0o15, Op(E::op_spd)),
    (0o17, Op(E::op_lbj)),
]);

static BASIC_071: [Decode; 16] = sub(&[
    (0o10, Op(E::op_da)),
    (0o11, Op(E::op_dan)),
    (0o12, Op(E::op_ds)),
    (0o13, Op(E::op_dl)),
    (0o14, Op(E::op_dln)),
    (0o15, Op(E::op_dlm)),
    (0o16, Op(E::op_djz)),
    (0o17, Op(E::op_dte)),
]);

static BASIC_072: [Decode; 16] = sub(&[
    (0o01, Op(E::op_slj)),
    (0o02, Op(E::op_jps)),
    (0o03, Op(E::op_jns)),
    (0o04, Op(E::op_ah)),
    (0o05, Op(E::op_anh)),
    (0o06, Op(E::op_at)),
    (0o07, Op(E::op_ant)),
    (0o10, Op(E::op_ex)),
    (0o11, Op(E::op_er)),
    (0o16, Op(E::op_srs)),
    (0o17, Op(E::op_lrs)),
]);

static BASIC_07315: [Decode; 16] = sub(&[
    (0o03, Op(E::op_acel)),
    (0o04, Op(E::op_dcel)),
    (0o12, Op(E::op_lae)),
    (0o14, Op(E::op_ld)),
    (0o15, Op(E::op_sd)),
    (0o16, Op(E::op_ur)),
]);

static BASIC_07317: [Decode; 16] = sub(&[
    (0o00, Op(E::op_ts)),
    (0o01, Op(E::op_tss)),
    (0o02, Op(E::op_tcs)),
    (0o03, Op(E::op_rtn)),
    (0o06, Op(E::op_iar)),
    (0o11, Op(E::op_locl)),
]);

static BASIC_073: [Decode; 16] = sub(&[
    (0o00, Op(E::op_ssc)),
    (0o01, Op(E::op_dsc)),
    (0o02, Op(E::op_ssl)),
    (0o03, Op(E::op_dsl)),
    (0o04, Op(E::op_ssa)),
    (0o05, Op(E::op_dsa)),
    (0o06, Op(E::op_lsc)),
    (0o07, Op(E::op_dlsc)),
    (0o10, Op(E::op_lssc)),
    (0o11, Op(E::op_ldsc)),
    (0o12, Op(E::op_lssl)),
    (0o13, Op(E::op_ldsl)),
    (0o15, ByA(&BASIC_07315)),
    (0o17, ByA(&BASIC_07317)),
]);

static BASIC_07404: [Decode; 16] = {
    let mut table = [Op(E::op_jk); 16];
    table[0] = Op(E::op_j);
    table
};

static BASIC_07414: [Decode; 16] = sub(&[
    (0o00, Op(E::op_jo)),
    (0o01, Op(E::op_jfu)),
    (0o02, Op(E::op_jfo)),
    (0o03, Op(E::op_jdf)),
    (0o07, Op(E::op_paij)),
]);

static BASIC_07415: [Decode; 16] = sub(&[
    (0o00, Op(E::op_jno)),
    (0o01, Op(E::op_jnfu)),
    (0o02, Op(E::op_jnfo)),
    (0o03, Op(E::op_jndf)),
    (0o05, Op(E::op_hltj)),
]);

static BASIC_074: [Decode; 16] = sub(&[
    (0o00, Op(E::op_jz)),
    (0o01, Op(E::op_jnz)),
    (0o02, Op(E::op_jp)),
    (0o03, Op(E::op_jn)),
    (0o04, ByA(&BASIC_07404)),
    (0o05, Op(E::op_hkj)),
    (0o06, Op(E::op_nop)),
    (0o07, Op(E::op_aaij)),
    (0o10, Op(E::op_jnb)),
    (0o11, Op(E::op_jb)),
    (0o12, Op(E::op_jmgi)),
    (0o13, Op(E::op_lmj)),
    (0o14, ByA(&BASIC_07414)),
    (0o15, ByA(&BASIC_07415)),
    (0o16, Op(E::op_jc)),
    (0o17, Op(E::op_jnc)),
]);

static BANK_075: [Decode; 16] = sub(&[
    (0o03, Op(E::op_lbu)),
    (0o05, Op(E::op_lbe)),
    (0o13, Op(E::op_lxlm)),
    (0o15, Op(E::op_cr)),
]);

static BASIC: [Decode; 64] = primary(&[
    (0o01, Op(E::op_sa)),
    (0o02, Op(E::op_sna)),
    (0o03, Op(E::op_sma)),
    (0o04, Op(E::op_sr)),
    (0o05, ByA(&STORE_CONSTANT)),
    (0o06, Op(E::op_sx)),
    (0o07, ByJ(&BASIC_007)),
    (0o10, Op(E::op_la)),
    (0o11, Op(E::op_lna)),
    (0o12, Op(E::op_lma)),
    (0o13, Op(E::op_lnma)),
    (0o14, Op(E::op_aa)),
    (0o15, Op(E::op_ana)),
    (0o16, Op(E::op_ama)),
    (0o17, Op(E::op_anma)),
    (0o20, Op(E::op_au)),
    (0o21, Op(E::op_anu)),
    (0o23, Op(E::op_lr)),
    (0o24, Op(E::op_ax)),
    (0o25, Op(E::op_anx)),
    (0o26, Op(E::op_lxm)),
    (0o27, Op(E::op_lx)),
    (0o30, Op(E::op_mi)),
    (0o31, Op(E::op_msi)),
    (0o32, Op(E::op_mf)),
    (0o34, Op(E::op_di)),
    (0o35, Op(E::op_dsf)),
    (0o36, Op(E::op_df)),
    (0o40, Op(E::op_or)),
    (0o41, Op(E::op_xor)),
    (0o42, Op(E::op_and)),
    (0o43, Op(E::op_mlu)),
    (0o44, Op(E::op_tep)),
    (0o45, Op(E::op_top)),
    (0o46, Op(E::op_lxi)),
    (0o47, Op(E::op_tlem)),
    (0o50, Op(E::op_tz_basic)),
    (0o51, Op(E::op_tnz_basic)),
    (0o52, Op(E::op_te)),
    (0o53, Op(E::op_tne)),
    (0o54, Op(E::op_tle)),
    (0o55, Op(E::op_tg)),
    (0o56, Op(E::op_tw)),
    (0o57, Op(E::op_tnw)),
    (0o60, Op(E::op_tp_basic)),
    (0o61, Op(E::op_tn_basic)),
    (0o70, Op(E::op_jgd)),
    (0o71, ByJ(&BASIC_071)),
    (0o72, ByJ(&BASIC_072)),
    (0o73, ByJ(&BASIC_073)),
    (0o74, ByJ(&BASIC_074)),
    (0o75, ByJ(&BANK_075)),
]);

// Extended mode.

static EXTENDED_007: [Decode; 16] = sub(&[
    (0o04, Op(E::op_laqw)),
    (0o05, Op(E::op_saqw)),
    (0o14, Op(E::op_lpd)),
    (0o15, Op(E::op_spd)),
    (0o16, Op(E::op_call)),
    (0o17, Op(E::op_goto)),
]);

static EXTENDED_033: [Decode; 16] = sub(&[
    (0o13, Op(E::op_tgm)),
    (0o14, Op(E::op_dtgm)),
    (0o15, Op(E::op_dcb)),
]);

static EXTENDED_03704: [Decode; 16] = sub(&[(0o05, Op(E::op_rngi)), (0o06, Op(E::op_rngb))]);

static EXTENDED_037: [Decode; 16] = sub(&[(0o04, ByA(&EXTENDED_03704))]);

static EXTENDED_050: [Decode; 16] = sub(&[
    (0o00, Op(E::op_tnop)),
    (0o01, Op(E::op_tgz)),
    (0o02, Op(E::op_tpz)),
    (0o03, Op(E::op_tp)),
    (0o04, Op(E::op_tmz)),
    (0o05, Op(E::op_tmzg)),
    (0o06, Op(E::op_tz)),
    (0o07, Op(E::op_tnlz)),
    (0o10, Op(E::op_tlz)),
    (0o11, Op(E::op_tnz)),
    (0o12, Op(E::op_tpzl)),
    (0o13, Op(E::op_tnmz)),
    (0o14, Op(E::op_tn)),
    (0o15, Op(E::op_tnpz)),
    (0o16, Op(E::op_tngz)),
    (0o17, Op(E::op_tskp)),
]);

static EXTENDED_071: [Decode; 16] = sub(&[
    (0o00, Op(E::op_mte)),
    (0o01, Op(E::op_mtne)),
    (0o02, Op(E::op_mtle)),
    (0o03, Op(E::op_mtg)),
    (0o04, Op(E::op_mtw)),
    (0o05, Op(E::op_mtnw)),
    (0o06, Op(E::op_matl)),
    (0o07, Op(E::op_matg)),
    (0o10, Op(E::op_da)),
    (0o11, Op(E::op_dan)),
    (0o12, Op(E::op_ds)),
    (0o13, Op(E::op_dl)),
    (0o14, Op(E::op_dln)),
    (0o15, Op(E::op_dlm)),
    (0o16, Op(E::op_djz)),
    (0o17, Op(E::op_dte)),
]);

static EXTENDED_072: [Decode; 16] = sub(&[
    (0o02, Op(E::op_jps)),
    (0o03, Op(E::op_jns)),
    (0o04, Op(E::op_ah)),
    (0o05, Op(E::op_anh)),
    (0o06, Op(E::op_at)),
    (0o07, Op(E::op_ant)),
    (0o16, Op(E::op_srs)),
    (0o17, Op(E::op_lrs)),
]);

static EXTENDED_07314: [Decode; 16] = sub(&[
    (0o00, Op(E::op_nop)),
    (0o04, Op(E::op_unlk)),
    (0o05, Op(E::op_ex)),
    (0o06, Op(E::op_exr)),
]);

static EXTENDED_07315: [Decode; 16] = sub(&[
    (0o03, Op(E::op_acel)),
    (0o04, Op(E::op_dcel)),
    (0o12, Op(E::op_lae)),
    (0o14, Op(E::op_ld)),
    (0o15, Op(E::op_sd)),
    (0o16, Op(E::op_ur)),
    (0o17, Op(E::op_sgnl)),
]);

static EXTENDED_07317: [Decode; 16] = sub(&[
    (0o00, Op(E::op_ts)),
    (0o01, Op(E::op_tss)),
    (0o02, Op(E::op_tcs)),
    (0o03, Op(E::op_rtn)),
    (0o04, Op(E::op_lud)),
    (0o05, Op(E::op_sud)),
    (0o06, Op(E::op_iar)),
    (0o11, Op(E::op_locl)),
]);

static EXTENDED_073: [Decode; 16] = sub(&[
    (0o00, Op(E::op_ssc)),
    (0o01, Op(E::op_dsc)),
    (0o02, Op(E::op_ssl)),
    (0o03, Op(E::op_dsl)),
    (0o04, Op(E::op_ssa)),
    (0o05, Op(E::op_dsa)),
    (0o06, Op(E::op_lsc)),
    (0o07, Op(E::op_dlsc)),
    (0o10, Op(E::op_lssc)),
    (0o11, Op(E::op_ldsc)),
    (0o12, Op(E::op_lssl)),
    (0o13, Op(E::op_ldsl)),
    (0o14, ByA(&EXTENDED_07314)),
    (0o15, ByA(&EXTENDED_07315)),
    (0o17, ByA(&EXTENDED_07317)),
]);

static EXTENDED_07414: [Decode; 16] = sub(&[
    (0o00, Op(E::op_jo)),
    (0o01, Op(E::op_jfu)),
    (0o02, Op(E::op_jfo)),
    (0o03, Op(E::op_jdf)),
    (0o04, Op(E::op_jc)),
    (0o05, Op(E::op_jnc)),
    (0o06, Op(E::op_aaij)),
    (0o07, Op(E::op_paij)),
]);

static EXTENDED_07415: [Decode; 16] = sub(&[
    (0o00, Op(E::op_jno)),
    (0o01, Op(E::op_jnfu)),
    (0o02, Op(E::op_jnfo)),
    (0o03, Op(E::op_jndf)),
    (0o04, Op(E::op_j)),
    (0o05, Op(E::op_hltj)),
]);

static EXTENDED_074: [Decode; 16] = sub(&[
    (0o00, Op(E::op_jz)),
    (0o01, Op(E::op_jnz)),
    (0o02, Op(E::op_jp)),
    (0o03, Op(E::op_jn)),
    (0o10, Op(E::op_jnb)),
    (0o11, Op(E::op_jb)),
    (0o12, Op(E::op_jmgi)),
    (0o13, Op(E::op_lmj)),
    (0o14, ByA(&EXTENDED_07414)),
    (0o15, ByA(&EXTENDED_07415)),
]);

static EXTENDED: [Decode; 64] = primary(&[
    (0o01, Op(E::op_sa)),
    (0o02, Op(E::op_sna)),
    (0o03, Op(E::op_sma)),
    (0o04, Op(E::op_sr)),
    (0o05, ByA(&STORE_CONSTANT)),
    (0o06, Op(E::op_sx)),
    (0o07, ByJ(&EXTENDED_007)),
    (0o10, Op(E::op_la)),
    (0o11, Op(E::op_lna)),
    (0o12, Op(E::op_lma)),
    (0o13, Op(E::op_lnma)),
    (0o14, Op(E::op_aa)),
    (0o15, Op(E::op_ana)),
    (0o16, Op(E::op_ama)),
    (0o17, Op(E::op_anma)),
    (0o20, Op(E::op_au)),
    (0o21, Op(E::op_anu)),
    (0o23, Op(E::op_lr)),
    (0o24, Op(E::op_ax)),
    (0o25, Op(E::op_anx)),
    (0o26, Op(E::op_lxm)),
    (0o27, Op(E::op_lx)),
    (0o30, Op(E::op_mi)),
    (0o31, Op(E::op_msi)),
    (0o32, Op(E::op_mf)),
    (0o33, ByJ(&EXTENDED_033)),
    (0o34, Op(E::op_di)),
    (0o35, Op(E::op_dsf)),
    (0o36, Op(E::op_df)),
    (0o37, ByJ(&EXTENDED_037)),
    (0o40, Op(E::op_or)),
    (0o41, Op(E::op_xor)),
    (0o42, Op(E::op_and)),
    (0o43, Op(E::op_mlu)),
    (0o44, Op(E::op_tep)),
    (0o45, Op(E::op_top)),
    (0o46, Op(E::op_lxi)),
    (0o47, Op(E::op_tlem)),
    (0o50, ByA(&EXTENDED_050)),
    (0o51, Op(E::op_lxsi)),
    (0o52, Op(E::op_te)),
    (0o53, Op(E::op_tne)),
    (0o54, Op(E::op_tle)),
    (0o55, Op(E::op_tg)),
    (0o56, Op(E::op_tw)),
    (0o57, Op(E::op_tnw)),
    (0o70, Op(E::op_jgd)),
    (0o71, ByJ(&EXTENDED_071)),
    (0o72, ByJ(&EXTENDED_072)),
    (0o73, ByJ(&EXTENDED_073)),
    (0o74, ByJ(&EXTENDED_074)),
    (0o75, ByJ(&BANK_075)),
]);

/// The handler for `ci` in the given mode, if it is a defined
/// instruction.
pub(crate) fn lookup(basic_mode: bool, ci: InstructionWord) -> Option<Handler> {
    let table = if basic_mode { &BASIC } else { &EXTENDED };
    let mut decode = table[ci.f() as usize];
    loop {
        decode = match decode {
            Invalid => return None,
            Op(handler) => return Some(handler),
            ByJ(next) => next[ci.j() as usize],
            ByA(next) => next[ci.a() as usize],
        };
    }
}

/// Whether `ci` may be the target of EXR.
pub(crate) fn exr_allowed(ci: InstructionWord) -> bool {
    let (j, a) = (ci.j(), ci.a());
    match ci.f() {
        0o01..=0o06 => true,
        0o14..=0o17 | 0o24 | 0o25 | 0o31 => true,
        0o33 => matches!(j, 0o13 | 0o14),
        0o37 => j == 0o04 && matches!(a, 0o05 | 0o06),
        0o44 | 0o45 => true,
        0o50 => true,
        0o52..=0o57 => true,
        0o71 => j <= 0o12 || j == 0o17,
        0o72 => (0o04..=0o07).contains(&j),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(f: u64, j: u64, a: u64) -> InstructionWord {
        InstructionWord::from_fields_u(f, j, a, 0, 0, 0, 0)
    }

    fn same(left: Option<Handler>, right: Handler) -> bool {
        left.is_some_and(|h| h as usize == right as usize)
    }

    #[test]
    fn test_primary_decode() {
        assert!(same(lookup(false, word(0o10, 0o16, 5)), E::op_la));
        assert!(same(lookup(true, word(0o10, 0, 5)), E::op_la));
        assert!(lookup(false, word(0o00, 0, 0)).is_none());
        assert!(lookup(false, word(0o60, 0, 0)).is_none());
        assert!(same(lookup(true, word(0o60, 0, 0)), E::op_tp_basic));
    }

    #[test]
    fn test_nested_decode() {
        assert!(same(lookup(false, word(0o73, 0o17, 0o06)), E::op_iar));
        assert!(same(lookup(true, word(0o73, 0o17, 0o06)), E::op_iar));
        assert!(same(lookup(false, word(0o73, 0o14, 0)), E::op_nop));
        assert!(same(lookup(true, word(0o74, 0o04, 0)), E::op_j));
        assert!(same(lookup(true, word(0o74, 0o04, 0o03)), E::op_jk));
        assert!(same(lookup(false, word(0o37, 0o04, 0o05)), E::op_rngi));
        assert!(lookup(false, word(0o37, 0o04, 0o04)).is_none());
        assert!(lookup(false, word(0o73, 0o16, 0)).is_none());
    }

    #[test]
    fn test_exr_targets() {
        assert!(exr_allowed(word(0o01, 0, 0)));
        assert!(!exr_allowed(word(0o71, 0o16, 0)));
        assert!(exr_allowed(word(0o71, 0o17, 0)));
        assert!(!exr_allowed(word(0o10, 0, 0)));
        assert!(!exr_allowed(word(0o73, 0o14, 0o06)));
    }
}
