mod common;

use common::*;
use mpc_ring2k::*;

fn assert_within_one(actual: i128, expected: i128) {
    assert!(
        (actual - expected).abs() <= 1,
        "expected {expected}±1, got {actual}"
    );
}

#[test]
fn test_trunc_a_shifts_within_one_unit() {
    let field = RingField::F64;
    let xs = share_values(field, &[1 << 20], 2, 301);
    let results = run_parties(2, 301, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let z = ev.trunc_a(&x, 10, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], 1024);
    }
}

#[test]
fn test_trunc_a_handles_negative_values() {
    let field = RingField::F64;
    let xs = share_values(field, &[-(1 << 20)], 2, 302);
    let results = run_parties(2, 302, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let z = ev.trunc_a(&x, 10, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], -1024);
    }
}

#[test]
fn test_trunc_a_n_party_uses_truncation_pairs() {
    let field = RingField::F64;
    let xs = share_values(field, &[1 << 30, -(1 << 24)], 3, 303);
    let results = run_parties(3, 303, move |rank, ev| {
        let x = ashr_tensor(field, &[2], xs[rank].clone());
        let z = ev.trunc_a(&x, 12, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], 1 << 18);
        assert_within_one(values[1], -(1 << 12));
    }
}

#[test]
fn test_trunc_a_zero_bits_is_identity() {
    let field = RingField::F64;
    let xs = share_values(field, &[99], 2, 304);
    let results = run_parties(2, 304, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let z = ev.trunc_a(&x, 0, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![99]);
    }
}

#[test]
fn test_trunc_a_rejects_ring_width_bits() {
    let results = run_parties(2, 305, |_, ev| {
        let x = Tensor::zeros(ElementType::Arith(RingField::F32), &[1]);
        ev.trunc_a(&x, 32, TruncSign::Unknown).unwrap_err()
    });
    for err in results {
        assert!(matches!(err, MpcError::InvalidParameter(_)));
    }
}

#[test]
fn test_trunc_a_pr_is_exact_on_zero() {
    let field = RingField::F64;
    let xs = share_values(field, &[0, 0, 0, 0], 2, 306);
    let results = run_parties(2, 306, move |rank, ev| {
        let x = ashr_tensor(field, &[4], xs[rank].clone());
        let z = ev.trunc_a_pr(&x, 18, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![0, 0, 0, 0]);
    }
}

#[test]
fn test_trunc_a_pr_is_exact_on_zero_with_three_parties() {
    let field = RingField::F64;
    let xs = share_values(field, &[0, 0], 3, 307);
    let results = run_parties(3, 307, move |rank, ev| {
        let x = ashr_tensor(field, &[2], xs[rank].clone());
        let z = ev.trunc_a_pr(&x, 18, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![0, 0]);
    }
}

#[test]
fn test_trunc_a_pr_shifts_within_one_unit() {
    let field = RingField::F64;
    let xs = share_values(field, &[1 << 20, -(1 << 20), 3 << 16], 2, 308);
    let results = run_parties(2, 308, move |rank, ev| {
        let x = ashr_tensor(field, &[3], xs[rank].clone());
        let z = ev.trunc_a_pr(&x, 10, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], 1 << 10);
        assert_within_one(values[1], -(1 << 10));
        assert_within_one(values[2], 3 << 6);
    }
}

#[test]
fn test_trunc_a_pr_works_in_f32() {
    let field = RingField::F32;
    let xs = share_values(field, &[1 << 16], 2, 309);
    let results = run_parties(2, 309, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let z = ev.trunc_a_pr(&x, 8, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], 1 << 8);
    }
}

#[test]
fn test_trunc_a_pr_rejects_bits_without_headroom() {
    let results = run_parties(2, 310, |_, ev| {
        let x = Tensor::zeros(ElementType::Arith(RingField::F32), &[1]);
        ev.trunc_a_pr(&x, 31, TruncSign::Unknown).unwrap_err()
    });
    for err in results {
        assert!(matches!(err, MpcError::InvalidParameter(_)));
    }
}

#[test]
fn test_trunc_a_pr2_shifts_within_one_unit() {
    let field = RingField::F64;
    let xs = share_values(field, &[1 << 20, -(1 << 20)], 2, 311);
    let results = run_parties(2, 311, move |rank, ev| {
        let x = ashr_tensor(field, &[2], xs[rank].clone());
        let z = ev.trunc_a_pr2(&x, 10, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], 1 << 10);
        assert_within_one(values[1], -(1 << 10));
    }
}

#[test]
fn test_trunc_a_pr2_is_zero_on_zero() {
    let field = RingField::F64;
    let xs = share_values(field, &[0], 2, 312);
    let results = run_parties(2, 312, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let z = ev.trunc_a_pr2(&x, 18, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![0]);
    }
}

#[test]
fn test_trunc_a_pr2_uses_a_wide_trunc_ring_when_needed() {
    let field = RingField::F128;
    let xs = share_values(field, &[1 << 90], 2, 313);
    let results = run_parties(2, 313, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        // m = 40 需要 64 位的截断环
        let z = ev.trunc_a_pr2(&x, 40, TruncSign::Unknown).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_within_one(values[0], 1 << 50);
    }
}

#[test]
fn test_trunc_a_pr2_is_two_party_only() {
    let results = run_parties(3, 314, |_, ev| {
        let x = Tensor::zeros(ElementType::Arith(RingField::F64), &[1]);
        ev.trunc_a_pr2(&x, 4, TruncSign::Unknown).unwrap_err()
    });
    for err in results {
        assert!(matches!(err, MpcError::InvalidParameter(_)));
    }
}

#[test]
fn test_compute_mw_counts_wrap_and_sign() {
    let field = RingField::F64;
    // x = 0，份额 (5, −5)：回绕 1 次，msb(x) = 0，期望 MW = 1
    let x_words = [vec![5u128], vec![encode(field, -5)]];
    let results = run_parties(2, 315, move |rank, ev| {
        let x = ashr_tensor(field, &[1], x_words[rank].clone());
        let mw = ev.compute_mw(&x, RingField::F32).unwrap();
        ev.a2p(&mw).unwrap().words().to_vec()
    });
    for words in results {
        assert_eq!(words, vec![1]);
    }
}

#[test]
fn test_compute_mw_adds_the_sign_bit_for_negative_secrets() {
    let field = RingField::F64;
    // x = −4，份额 (3, −7)：无回绕，msb(x) = 1，期望 MW = 1
    let x_words = [vec![3u128], vec![encode(field, -7)]];
    let results = run_parties(2, 316, move |rank, ev| {
        let x = ashr_tensor(field, &[1], x_words[rank].clone());
        let mw = ev.compute_mw(&x, RingField::F32).unwrap();
        ev.a2p(&mw).unwrap().words().to_vec()
    });
    for words in results {
        assert_eq!(words, vec![1]);
    }
}
