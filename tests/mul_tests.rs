mod common;

use common::*;
use mpc_ring2k::*;

#[test]
fn test_mul_aa_reconstructs_to_product() {
    let field = RingField::F64;
    let xs = share_values(field, &[5], 2, 201);
    let ys = share_values(field, &[-3], 2, 202);
    let results = run_parties(2, 201, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let y = ashr_tensor(field, &[1], ys[rank].clone());
        let z = ev.mul_aa(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![-15]);
    }
}

#[test]
fn test_mul_aa_works_with_three_parties() {
    let field = RingField::F64;
    let xs = share_values(field, &[7, -2, 0], 3, 203);
    let ys = share_values(field, &[6, 9, 1234], 3, 204);
    let results = run_parties(3, 203, move |rank, ev| {
        let x = ashr_tensor(field, &[3], xs[rank].clone());
        let y = ashr_tensor(field, &[3], ys[rank].clone());
        let z = ev.mul_aa(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![42, -18, 0]);
    }
}

#[test]
fn test_mul_aa_covers_all_ring_widths() {
    for field in [RingField::F32, RingField::F64, RingField::F128] {
        let xs = share_values(field, &[11], 2, 205);
        let ys = share_values(field, &[13], 2, 206);
        let results = run_parties(2, 205, move |rank, ev| {
            let x = ashr_tensor(field, &[1], xs[rank].clone());
            let y = ashr_tensor(field, &[1], ys[rank].clone());
            let z = ev.mul_aa(&x, &y).unwrap();
            open_signed(ev, &z)
        });
        for values in results {
            assert_eq!(values, vec![143]);
        }
    }
}

#[test]
fn test_square_a_reconstructs_to_square() {
    let field = RingField::F64;
    let xs = share_values(field, &[2, -3], 2, 207);
    let results = run_parties(2, 207, move |rank, ev| {
        let x = ashr_tensor(field, &[2], xs[rank].clone());
        let z = ev.square_a(&x).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![4, 9]);
    }
}

#[test]
fn test_aliased_mul_matches_square() {
    let field = RingField::F64;
    let xs = share_values(field, &[-6], 2, 208);
    let results = run_parties(2, 208, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let z = ev.mul_aa(&x, &x).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![36]);
    }
}

#[test]
fn test_matmul_aa_with_identity_is_identity() {
    let field = RingField::F64;
    // 3×3 单位阵（份额形式）⊗ 向量 (1,2,3)
    let eye = share_values(field, &[1, 0, 0, 0, 1, 0, 0, 0, 1], 2, 209);
    let vec3 = share_values(field, &[1, 2, 3], 2, 210);
    let results = run_parties(2, 209, move |rank, ev| {
        let m = ashr_tensor(field, &[3, 3], eye[rank].clone());
        let v = ashr_tensor(field, &[3, 1], vec3[rank].clone());
        let z = ev.matmul_aa(&m, &v).unwrap();
        (z.shape().to_vec(), open_signed(ev, &z))
    });
    for (shape, values) in results {
        assert_eq!(shape, vec![3, 1]);
        assert_eq!(values, vec![1, 2, 3]);
    }
}

#[test]
fn test_matmul_aa_general_product() {
    let field = RingField::F64;
    let a = share_values(field, &[1, 2, 3, 4], 2, 211);
    let b = share_values(field, &[5, -6, 7, 8], 2, 212);
    let results = run_parties(2, 211, move |rank, ev| {
        let x = ashr_tensor(field, &[2, 2], a[rank].clone());
        let y = ashr_tensor(field, &[2, 2], b[rank].clone());
        let z = ev.matmul_aa(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    // [[1,2],[3,4]] · [[5,-6],[7,8]] = [[19,10],[43,14]]
    for values in results {
        assert_eq!(values, vec![19, 10, 43, 14]);
    }
}

#[test]
fn test_matmul_aa_rejects_inner_dim_mismatch() {
    let field = RingField::F64;
    let results = run_parties(2, 213, move |_, ev| {
        let x = Tensor::zeros(ElementType::Arith(field), &[2, 3]);
        let y = Tensor::zeros(ElementType::Arith(field), &[2, 3]);
        ev.matmul_aa(&x, &y).unwrap_err()
    });
    for err in results {
        assert!(matches!(err, MpcError::ShapeMismatch(_)));
    }
}

#[test]
fn test_mul_aa_rejects_field_mismatch() {
    let results = run_parties(2, 214, |_, ev| {
        let x = Tensor::zeros(ElementType::Arith(RingField::F64), &[1]);
        let y = Tensor::zeros(ElementType::Arith(RingField::F32), &[1]);
        ev.mul_aa(&x, &y).unwrap_err()
    });
    for err in results {
        assert!(matches!(err, MpcError::TypeMismatch(_)));
    }
}

#[test]
fn test_mul_a1b_gates_by_the_bit() {
    let field = RingField::F64;
    let xs = share_values(field, &[7, 7], 2, 215);
    // 第一个元素 b = 1⊕0 = 1，第二个 b = 1⊕1 = 0；
    // bit 0 之上塞入垃圾位，验证协议先掩到 1 位
    let b_words = [vec![0b101, 0b11], vec![0b110, 0b1001]];
    let results = run_parties(2, 215, move |rank, ev| {
        let x = ashr_tensor(field, &[2], xs[rank].clone());
        let y = Tensor::from_words(ElementType::Bool(field), &[2], b_words[rank].clone()).unwrap();
        let z = ev.mul_a1b(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![7, 0]);
    }
}

#[test]
fn test_mul_a1b_handles_negative_values() {
    let field = RingField::F64;
    let xs = share_values(field, &[-21], 2, 216);
    let b_words = [vec![1u128], vec![0u128]];
    let results = run_parties(2, 216, move |rank, ev| {
        let x = ashr_tensor(field, &[1], xs[rank].clone());
        let y = Tensor::from_words(ElementType::Bool(field), &[1], b_words[rank].clone()).unwrap();
        let z = ev.mul_a1b(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![-21]);
    }
}

#[test]
fn test_mul_vvs_multiplies_private_inputs() {
    let field = RingField::F64;
    let results = run_parties(2, 217, move |rank, ev| {
        // 0 号方持有 9，1 号方持有 4
        let x = if rank == 0 {
            Tensor::from_words(ElementType::Private(field, 0), &[1], vec![9]).unwrap()
        } else {
            Tensor::zeros(ElementType::Private(field, 0), &[1])
        };
        let y = if rank == 1 {
            Tensor::from_words(ElementType::Private(field, 1), &[1], vec![4]).unwrap()
        } else {
            Tensor::zeros(ElementType::Private(field, 1), &[1])
        };
        let z = ev.mul_vvs(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![36]);
    }
}

#[test]
fn test_mul_vvs_is_owner_order_independent() {
    let field = RingField::F64;
    let results = run_parties(2, 218, move |rank, ev| {
        // 这次 x 由 1 号方持有，y 由 0 号方持有
        let x = if rank == 1 {
            Tensor::from_words(ElementType::Private(field, 1), &[1], vec![12]).unwrap()
        } else {
            Tensor::zeros(ElementType::Private(field, 1), &[1])
        };
        let y = if rank == 0 {
            Tensor::from_words(ElementType::Private(field, 0), &[1], vec![-5i128 as u128]).unwrap()
        } else {
            Tensor::zeros(ElementType::Private(field, 0), &[1])
        };
        let z = ev.mul_vvs(&x, &y).unwrap();
        open_signed(ev, &z)
    });
    for values in results {
        assert_eq!(values, vec![-60]);
    }
}

#[test]
fn test_mul_vvs_rejects_equal_owners() {
    let field = RingField::F64;
    let results = run_parties(2, 219, move |_, ev| {
        let x = Tensor::zeros(ElementType::Private(field, 0), &[1]);
        let y = Tensor::zeros(ElementType::Private(field, 0), &[1]);
        ev.mul_vvs(&x, &y).unwrap_err()
    });
    for err in results {
        assert!(matches!(err, MpcError::InvalidRank(_)));
    }
}
