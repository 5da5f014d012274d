//! Fixed-point truncation protocols
//!
//! Three variants over the signed-in-ring encoding (|x| < 2^{k−2}):
//!
//! - `trunc_a` — deterministic: local arithmetic shifts for two parties,
//!   a dealer truncation pair for N > 2;
//! - `trunc_a_pr` — probabilistic, at most one unit of error, exact on
//!   zero;
//! - `trunc_a_pr2` — two-party one-bit-error variant built on the modular
//!   wrap indicator `compute_mw`, which itself multiplies two private
//!   bits with MulVVS.

use super::{expect_arith, Evaluator};
use crate::ring::{ops, ElementType, RingField, Tensor};
use crate::{MpcError, Result};
use serde::{Deserialize, Serialize};

/// 截断输入的符号提示
///
/// 调用方若确知秘密的符号可以传入提示；当前实现不依赖它，正确性对
/// 三种取值一致。
// TODO: exploit a Positive hint in trunc_a_pr2 to skip the msb term of the
// wrap indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncSign {
    Unknown,
    Positive,
    Negative,
}

fn check_bits(field: RingField, m: u32) -> Result<()> {
    if m >= field.bits() {
        return Err(MpcError::InvalidParameter(format!(
            "cannot truncate {} bits in a {}-bit ring",
            m,
            field.bits()
        )));
    }
    Ok(())
}

impl Evaluator {
    /// TruncA: 确定性截断（算术右移 m 位）
    ///
    /// 两方时各自本地移位（SecureML 定理 1 的一比特偏差，接受）；
    /// 多方时使用截断对 (r, r≫m)，打开 x−r 后由 0 号方补上 (x−r)≫m。
    pub fn trunc_a(&mut self, x: &Tensor, bits: u32, _sign: TruncSign) -> Result<Tensor> {
        let field = expect_arith(x)?;
        if bits == 0 {
            return Ok(x.clone());
        }
        check_bits(field, bits)?;

        if self.world_size() == 2 {
            return Ok(ops::arshift(x, bits));
        }

        let pair = self.provider_mut().trunc(field, x.numel(), bits)?;
        let ring = ElementType::Ring(field);
        let r = Tensor::from_le_bytes(ring, x.shape(), &pair.r)?;
        let rs = Tensor::from_le_bytes(ring, x.shape(), &pair.rs)?;
        let e = self.comm().all_reduce_sum(&ops::sub(x, &r)?, "open(x-r)")?;
        let mut z = rs;
        if self.rank() == 0 {
            z = ops::add(&z, &ops::arshift(&e, bits))?;
        }
        z.as_type(ElementType::Arith(field))
    }

    /// TruncAPr: 概率性截断，至多一比特误差，零上精确
    ///
    /// 0 号方先给 x 加偏置 2^{k−2} 把有符号范围搬进非负半环；打开
    /// c = x + r 后用 r 的最高位与 msb(c) 的异或纠正回绕，最后减掉
    /// 2^{k−2−m} 抵消偏置。
    pub fn trunc_a_pr(&mut self, x: &Tensor, bits: u32, _sign: TruncSign) -> Result<Tensor> {
        let field = expect_arith(x)?;
        if bits == 0 {
            return Ok(x.clone());
        }
        let k = field.bits();
        if bits > k - 2 {
            return Err(MpcError::InvalidParameter(format!(
                "probabilistic truncation needs bits <= {} in a {}-bit ring, got {}",
                k - 2,
                k,
                bits
            )));
        }

        let triple = self.provider_mut().trunc_pr(field, x.numel(), bits)?;
        let ring = ElementType::Ring(field);
        let r = Tensor::from_le_bytes(ring, x.shape(), &triple.r)?;
        let rc = Tensor::from_le_bytes(ring, x.shape(), &triple.rc)?;
        let rb = Tensor::from_le_bytes(ring, x.shape(), &triple.rb)?;

        let mut biased = x.as_type(ring)?;
        if self.rank() == 0 {
            biased = ops::add_scalar(&biased, 1u128 << (k - 2));
        }
        let c = self.comm().all_reduce_sum(&ops::add(&biased, &r)?, "open(x+r)")?;

        // b_i = r_b_i ⊕ msb(c)，以算术形式表达
        let ck = ops::msb(&c);
        let mut b = ops::sub(&rb, &ops::mul_scalar(&ops::mul(&ck, &rb)?, 2))?;
        if self.rank() == 0 {
            b = ops::add(&b, &ck)?;
        }

        // ĉ = (c ≪ 1) ≫ (m+1)
        let chat = ops::rshift(&ops::lshift(&c, 1), bits + 1);
        let mut z = ops::sub(&ops::mul_scalar(&b, 1u128 << (k - 1 - bits)), &rc)?;
        if self.rank() == 0 {
            z = ops::add(&z, &chat)?;
            z = ops::sub_scalar(&z, 1u128 << (k - 2 - bits));
        }
        z.as_type(ElementType::Arith(field))
    }

    /// TruncAPr2: 两方一比特误差截断（几何法）
    ///
    /// 在能容纳 m 比特的最小截断环里计算回绕指示 MW，然后每方输出
    /// xᵢ≫m − MW·2^{k−m} + rank。`+rank` 在两方合计贡献 +1，使
    /// trunc(0) = 0。
    pub fn trunc_a_pr2(&mut self, x: &Tensor, bits: u32, _sign: TruncSign) -> Result<Tensor> {
        let field = expect_arith(x)?;
        if self.world_size() != 2 {
            return Err(MpcError::InvalidParameter(format!(
                "TruncAPr2 is two-party only, world is {}",
                self.world_size()
            )));
        }
        if bits == 0 {
            return Ok(x.clone());
        }
        let k = field.bits();
        check_bits(field, bits)?;
        let trunc_field = RingField::smallest_for_bits(bits).ok_or_else(|| {
            MpcError::InvalidParameter(format!("no ring can host a {bits}-bit wrap indicator"))
        })?;

        let mw = self.compute_mw(x, trunc_field)?;
        // MW 份额模 2^{k'} 回绕的 w·2^{k'} 在乘以 2^{k−m} 后因 k' ≥ m
        // 而落到 2^k 的倍数上，提升到输出环不破坏和。
        let lifted = ops::mul_scalar(
            &Tensor::from_raw(
                ElementType::Ring(field),
                x.shape().to_vec(),
                mw.words().to_vec(),
            ),
            1u128 << (k - bits),
        );
        let z = ops::add_scalar(
            &ops::sub(&ops::rshift(x, bits), &lifted)?,
            self.rank() as u128,
        );
        z.as_type(ElementType::Arith(field))
    }

    /// computeMW: 两方模回绕指示
    ///
    /// 返回截断环 F' 中的算术份额，其和等于 Wrap(x₀, x₁, 2^k) + msb(x)。
    /// 0 号方比较 x₀ − L/4，1 号方比较 x₁，比较结果经 MulVVS 相乘，
    /// 0 号方再加上 1 − [x₀ < L/4]。
    pub fn compute_mw(&mut self, x: &Tensor, trunc_field: RingField) -> Result<Tensor> {
        expect_arith(x)?;
        if self.world_size() != 2 {
            return Err(MpcError::InvalidParameter(format!(
                "the wrap indicator is two-party only, world is {}",
                self.world_size()
            )));
        }
        let me = self.rank();
        if me > 1 {
            return Err(MpcError::InvalidRank(format!(
                "wrap indicator ranks must be in {{0,1}}, got {me}"
            )));
        }
        let field = x.field();
        let half = field.sign_bit();
        let quarter = half >> 1;

        let star: Vec<u128> = x
            .words()
            .iter()
            .map(|&w| {
                let v = if me == 0 {
                    field.mask(w.wrapping_sub(quarter))
                } else {
                    w
                };
                (v >= half) as u128
            })
            .collect();
        let mine = Tensor::from_raw(
            ElementType::Private(trunc_field, me),
            x.shape().to_vec(),
            star,
        );
        let other = Tensor::zeros(ElementType::Private(trunc_field, 1 - me), x.shape());

        let mut mw = if me == 0 {
            self.mul_vvs(&mine, &other)?
        } else {
            self.mul_vvs(&other, &mine)?
        };
        if me == 0 {
            let corr: Vec<u128> = x
                .words()
                .iter()
                .map(|&w| if w < quarter { 0 } else { 1 })
                .collect();
            let corr = Tensor::from_raw(
                ElementType::Ring(trunc_field),
                x.shape().to_vec(),
                corr,
            );
            mw = ops::add(&mw, &corr)?;
        }
        Ok(mw)
    }
}
