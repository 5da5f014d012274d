//! Share-form conversions
//!
//! Moves values between the public, single-owner private and additively
//! shared representations. Every conversion preserves the sharing
//! invariant: the per-party results always sum (mod 2^k) to the logical
//! secret.

use super::{expect_arith, expect_private, expect_public, Evaluator};
use crate::ring::{ops, ElementType, RingField, Tensor};
use crate::{MpcError, Result};

impl Evaluator {
    /// RandA: 采样一个均匀的秘密算术份额
    ///
    /// 私有随机采样后算术右移 2 位，保证秘密落在 [−2^{k−2}, 2^{k−2})，
    /// 使得下游的有符号解释与截断良定义。
    pub fn rand_a(&mut self, field: RingField, shape: &[usize]) -> Result<Tensor> {
        let r = self.prg_mut().gen_priv(field, shape);
        ops::arshift(&r, 2).as_type(ElementType::Arith(field))
    }

    /// P2A: 公开值转算术份额
    ///
    /// 每方从 PRSS 取相关对 (r₀, r₁)，份额为 r₀−r₁（全体和为零）；
    /// 0 号方额外加上公开值。
    pub fn p2a(&mut self, x: &Tensor) -> Result<Tensor> {
        let field = expect_public(x)?;
        let (r0, r1) = self.prg_mut().gen_prss_pair(field, x.shape());
        let mut share = ops::sub(&r0, &r1)?;
        if self.rank() == 0 {
            share = ops::add(&share, x)?;
        }
        share.as_type(ElementType::Arith(field))
    }

    /// A2P: 打开算术份额为公开值（all-reduce 求和）
    pub fn a2p(&mut self, x: &Tensor) -> Result<Tensor> {
        let field = expect_arith(x)?;
        let opened = self.comm().all_reduce_sum(x, "a2p")?;
        opened.as_type(ElementType::Public(field))
    }

    /// V2A: 单方私有值转算术份额
    ///
    /// 与 P2A 相同，但由持有方（而非 0 号方）加上明文。
    pub fn v2a(&mut self, x: &Tensor) -> Result<Tensor> {
        let (field, owner) = expect_private(x)?;
        if owner >= self.world_size() {
            return Err(MpcError::InvalidRank(format!(
                "private owner {} out of world {}",
                owner,
                self.world_size()
            )));
        }
        let (r0, r1) = self.prg_mut().gen_prss_pair(field, x.shape());
        let mut share = ops::sub(&r0, &r1)?;
        if self.rank() == owner {
            share = ops::add(&share, x)?;
        }
        share.as_type(ElementType::Arith(field))
    }

    /// A2V: 将算术份额重构到指定参与方
    ///
    /// 所有份额 gather 到 rank r，由其求和；其余方返回同形状的占位
    /// 张量。仅 r 方得知秘密。
    pub fn a2v(&mut self, x: &Tensor, rank: usize) -> Result<Tensor> {
        let field = expect_arith(x)?;
        if rank >= self.world_size() {
            return Err(MpcError::InvalidRank(format!(
                "reveal target {} out of world {}",
                rank,
                self.world_size()
            )));
        }
        let ty = ElementType::Private(field, rank);
        match self.comm().gather(x, rank, "a2v.gather")? {
            Some(parts) => {
                let mut acc = Tensor::zeros(ElementType::Ring(field), x.shape());
                for p in &parts {
                    acc = ops::add(&acc, &p.as_type(acc.ty())?)?;
                }
                acc.as_type(ty)
            }
            None => Ok(Tensor::zeros(ty, x.shape())),
        }
    }

    /// NegateA: 逐元素取负，线性且本地
    pub fn negate_a(&mut self, x: &Tensor) -> Result<Tensor> {
        expect_arith(x)?;
        Ok(ops::neg(x))
    }
}
