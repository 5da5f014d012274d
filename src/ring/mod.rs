//! # 环代数模块 (Ring Algebra Module)
//!
//! 本模块提供二次幂环 Z_{2^k} 上的类型化张量及其逐元素运算。
//! 支持的环宽度为 k ∈ {32, 64, 128}，算术均为无符号模运算；
//! 有符号语义通过二进制补码约定施加（秘密幅值 |x| < 2^{k−2}）。
//!
//! ## 核心概念 (Core Concepts)
//!
//! ### 环域 (Ring Field)
//! [`RingField`] 标记环宽度并固定模数 M = 2^k。元素统一存储为 u128 字，
//! 每次运算后按环宽度掩码，因而同一套逐元素内核覆盖全部三种宽度，
//! 紧循环内没有动态分发。
//!
//! ### 元素类型 (Element Type)
//! [`ElementType`] 为同一缓冲区赋予不同语义标签：
//! - **Public**: 所有参与方持有相同的公开值
//! - **Private(owner)**: 仅 owner 方持有明文，其余方持有占位值
//! - **Arith**: 加法算术份额，Σᵢ xᵢ ≡ x (mod 2^k)
//! - **Bool**: 单比特布尔份额，b = ⊕ᵢ bᵢ
//! - **Ring**: 未标记的环元素，仅作中间值使用
//!
//! ### 张量 (Tensor)
//! [`Tensor`] 由形状、元素类型和引用计数的 u128 字缓冲区组成。
//! 标签转换 (`as_type`) 不复制数据；缓冲区标识是 Beaver 缓存的键。

pub mod tensor;
pub mod ops;

pub use tensor::*;
pub use ops::*;

use serde::{Deserialize, Serialize};

/// 环域标记，固定模数 M = 2^k
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingField {
    F32,
    F64,
    F128,
}

impl RingField {
    /// 环宽度 k
    #[inline]
    pub fn bits(&self) -> u32 {
        match self {
            RingField::F32 => 32,
            RingField::F64 => 64,
            RingField::F128 => 128,
        }
    }

    /// 每个元素占用的字节数
    #[inline]
    pub fn bytes(&self) -> usize {
        (self.bits() as usize) / 8
    }

    /// 将一个 u128 字掩码到环宽度内
    #[inline]
    pub fn mask(&self, v: u128) -> u128 {
        match self {
            RingField::F32 => v & 0xFFFF_FFFF,
            RingField::F64 => v & 0xFFFF_FFFF_FFFF_FFFF,
            RingField::F128 => v,
        }
    }

    /// 最高位（符号位）的值，即 2^{k−1}
    #[inline]
    pub fn sign_bit(&self) -> u128 {
        1u128 << (self.bits() - 1)
    }

    /// 返回能容纳 m 比特的最小环域
    ///
    /// 用于 TruncAPr2 选择回绕指示所在的截断环。
    pub fn smallest_for_bits(m: u32) -> Option<RingField> {
        if m <= 32 {
            Some(RingField::F32)
        } else if m <= 64 {
            Some(RingField::F64)
        } else if m <= 128 {
            Some(RingField::F128)
        } else {
            None
        }
    }
}
