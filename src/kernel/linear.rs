//! Linear operations on shares
//!
//! All of these are local: they touch no network and keep the sharing
//! invariant by construction. Public operands must be identical on every
//! party; only party 0 folds a public addend into its share so the sum
//! stays correct.

use super::{expect_arith, expect_public, expect_same_field, expect_same_shape, Evaluator};
use crate::ring::{ops, Tensor};
use crate::Result;

impl Evaluator {
    /// AddAP: 份额加公开值（仅 0 号方相加）
    pub fn add_ap(&mut self, a: &Tensor, p: &Tensor) -> Result<Tensor> {
        expect_arith(a)?;
        expect_public(p)?;
        expect_same_field(a, p)?;
        expect_same_shape(a, p)?;
        if self.rank() == 0 {
            ops::add(a, p)
        } else {
            Ok(a.clone())
        }
    }

    /// SubAP: 份额减公开值（仅 0 号方相减）
    pub fn sub_ap(&mut self, a: &Tensor, p: &Tensor) -> Result<Tensor> {
        expect_arith(a)?;
        expect_public(p)?;
        expect_same_field(a, p)?;
        expect_same_shape(a, p)?;
        if self.rank() == 0 {
            ops::sub(a, p)
        } else {
            Ok(a.clone())
        }
    }

    /// AddAA: 份额逐元素相加
    pub fn add_aa(&mut self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        expect_arith(a)?;
        expect_arith(b)?;
        expect_same_field(a, b)?;
        expect_same_shape(a, b)?;
        ops::add(a, b)
    }

    /// SubAA: 份额逐元素相减
    pub fn sub_aa(&mut self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        expect_arith(a)?;
        expect_arith(b)?;
        expect_same_field(a, b)?;
        expect_same_shape(a, b)?;
        ops::sub(a, b)
    }

    /// MulAP: 份额乘公开张量（每方本地相乘）
    pub fn mul_ap(&mut self, a: &Tensor, p: &Tensor) -> Result<Tensor> {
        expect_arith(a)?;
        expect_public(p)?;
        expect_same_field(a, p)?;
        expect_same_shape(a, p)?;
        ops::mul(a, p)
    }

    /// MatMulAP: 份额矩阵 [m,k] 乘公开矩阵 [k,n]
    pub fn matmul_ap(&mut self, a: &Tensor, p: &Tensor) -> Result<Tensor> {
        expect_arith(a)?;
        expect_public(p)?;
        expect_same_field(a, p)?;
        ops::matmul(a, p)
    }

    /// LShiftA: 按位左移，移位量为长度 1（广播）或逐元素的向量
    pub fn lshift_a(&mut self, a: &Tensor, bits: &[u32]) -> Result<Tensor> {
        expect_arith(a)?;
        ops::lshift_vec(a, bits)
    }
}
