//! # Beaver 相关性模块 (Beaver Correlations Module)
//!
//! Beaver 三元组是半诚实乘法协议的离线原料。本模块定义提供者接口
//! [`BeaverProvider`]、掩码重放描述符 [`ReplayDesc`]、以及内核侧的
//! 打开值缓存 [`BeaverCache`]；并给出一个可信第三方的进程内实现
//! [`TrustedDealer`]。
//!
//! ## 相关性种类 (Correlation Kinds)
//!
//! - **Mul**: (a, b, c)，Σa · Σb = Σc（逐元素）
//! - **Dot**: (a[m×k], b[k×n], c[m×n])，Σa ⋅ Σb = Σc（矩阵乘）
//! - **Square**: (a, a²)
//! - **MulPriv**（两方）: a₀·a₁ = c₀ + c₁
//! - **Trunc**: (r, r ≫ₐ bits)
//! - **TruncPr**: (r, r_c, r_b)，r_b = msb(r)，r_c = (r mod 2^{k−1}) ≫ bits
//!
//! ## 缓冲区约定 (Buffer Convention)
//!
//! 提供者以扁平的小端字节缓冲区返回各相关性，长度必须等于
//! `numel × sizeof(field)`；内核在解析时校验，不符即提供者违约。
//!
//! ## 重放描述符 (Replay Descriptor)
//!
//! 描述符记录再生某个掩码份额所需的种子材料。内核将其视为不透明的
//! 元数据：缓存命中时把描述符原样传回提供者，提供者据此再生出同一个
//! 掩码 a，从而允许跨运算复用已打开的 x−a。

pub mod cache;
pub mod dealer;

pub use cache::*;
pub use dealer::*;

use crate::ring::RingField;
use crate::Result;
use serde::{Deserialize, Serialize};

/// 掩码重放描述符：种子标识 + 流计数器
///
/// 对内核不透明；提供者与缓存共同约定其含义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDesc {
    pub seed: u64,
    pub counter: u64,
}

/// 逐元素/矩阵乘法三元组（本方份额）
#[derive(Debug, Clone)]
pub struct MulTriple {
    pub a: Vec<u8>,
    pub b: Vec<u8>,
    pub c: Vec<u8>,
    pub desc_a: ReplayDesc,
    pub desc_b: ReplayDesc,
}

/// 平方对（本方份额）
#[derive(Debug, Clone)]
pub struct SquarePair {
    pub a: Vec<u8>,
    pub sq: Vec<u8>,
    pub desc_a: ReplayDesc,
}

/// 两方私有乘法对（本方份额）：a₀·a₁ = c₀ + c₁
#[derive(Debug, Clone)]
pub struct PrivMulPair {
    pub a: Vec<u8>,
    pub c: Vec<u8>,
}

/// 确定性截断对（本方份额）：(r, r ≫ₐ bits)
#[derive(Debug, Clone)]
pub struct TruncPair {
    pub r: Vec<u8>,
    pub rs: Vec<u8>,
}

/// 概率截断三元组（本方份额）：(r, r_c, r_b)
#[derive(Debug, Clone)]
pub struct TruncPrTriple {
    pub r: Vec<u8>,
    pub rc: Vec<u8>,
    pub rb: Vec<u8>,
}

/// Beaver 提供者接口
///
/// 每个参与方持有自己的提供者句柄；所有参与方必须以相同的顺序发出
/// 相同参数的请求（锁步），提供者据此保证各方份额来自同一份相关性。
pub trait BeaverProvider: Send {
    fn mul(
        &mut self,
        field: RingField,
        numel: usize,
        replay_x: Option<ReplayDesc>,
        replay_y: Option<ReplayDesc>,
    ) -> Result<MulTriple>;

    fn dot(
        &mut self,
        field: RingField,
        m: usize,
        n: usize,
        k: usize,
        replay_x: Option<ReplayDesc>,
        replay_y: Option<ReplayDesc>,
    ) -> Result<MulTriple>;

    fn square(
        &mut self,
        field: RingField,
        numel: usize,
        replay_x: Option<ReplayDesc>,
    ) -> Result<SquarePair>;

    fn mul_priv(&mut self, field: RingField, numel: usize) -> Result<PrivMulPair>;

    fn trunc(&mut self, field: RingField, numel: usize, bits: u32) -> Result<TruncPair>;

    fn trunc_pr(&mut self, field: RingField, numel: usize, bits: u32) -> Result<TruncPrTriple>;
}
