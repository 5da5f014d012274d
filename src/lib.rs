//! # MPC Ring2k - 二次幂环上的安全多方计算内核 (Secure Computation Kernel over Power-of-Two Rings)
//!
//! 这是一个用 Rust 实现的半诚实 (semi-honest) 安全多方计算算术内核。
//! 所有计算都在二次幂环 Z_{2^k} 上进行，支持 k ∈ {32, 64, 128}。
//!
//! ## 核心组件 (Core Components)
//!
//! ### 加法秘密分享 (Additive Secret Sharing)
//! 秘密 x 被拆分为份额 x₀,…,x_{N−1}，满足 x ≡ Σ xᵢ (mod 2^k)，
//! 每个参与方只知道自己的份额。
//!
//! ### 份额形式转换 (Share-Form Conversions)
//! - **P2A / A2P**: 公开值与算术份额的相互转换
//! - **V2A / A2V**: 单方私有值与算术份额的相互转换
//! - **RandA**: 从私有随机源采样算术份额
//!
//! ### Beaver 三元组乘法 (Beaver Triple Multiplication)
//! - **MulAA / SquareA / MatMulAA**: 基于掩码打开的份额乘法、平方与矩阵乘法
//! - **Beaver 缓存**: 允许跨运算复用同一掩码及其打开值，节省通信轮次
//! - **MulA1B**: 算术份额与单比特布尔份额的混合协议乘法
//! - **MulVVS**: 两方私有值乘法
//!
//! ### 定点截断 (Fixed-Point Truncation)
//! - **TruncA**: 确定性截断（两方本地移位 / 多方截断对）
//! - **TruncAPr**: 概率性截断，至多一比特误差
//! - **TruncAPr2**: 基于模回绕指示 (modular wrap) 的两方一比特误差截断
//!
//! ## 设计原则 (Design Principles)
//!
//! 1. **半诚实安全**: 所有协议在 semi-honest 模型下保持份额不变量
//! 2. **环运算**: 元素以 u128 存储并按环宽度掩码，紧循环内无动态分发
//! 3. **锁步通信**: 每个参与方执行相同的集合通信序列，消息以标签字符串配对
//! 4. **模块化**: 环代数、通信、随机源与 Beaver 提供者均位于内核之外
//!
//! ## 使用示例 (Usage Example)
//!
//! ```no_run
//! use mpc_ring2k::*;
//!
//! // 搭建一个两方的本地计算环境（每个参与方运行在自己的线程上）
//! let world = 2;
//! let dealer = TrustedDealer::new(world, 7);
//! let comms = LocalMesh::connect(world);
//! for (rank, comm) in comms.into_iter().enumerate() {
//!     let prg = PrgState::setup(42, rank, world);
//!     let provider = dealer.handle(rank);
//!     let mut ev = Evaluator::new(comm, prg, Box::new(provider));
//!     // 每个参与方在 ev 上执行相同的操作序列
//!     let x = ev.p2a(&Tensor::from_scalar(RingField::F64, &[1], 7)).unwrap();
//!     let opened = ev.a2p(&x).unwrap();
//!     assert_eq!(opened.words()[0], 7);
//! }
//! ```

pub mod ring;
pub mod comm;
pub mod prg;
pub mod beaver;
pub mod kernel;

pub use ring::*;
pub use comm::*;
pub use prg::*;
pub use beaver::*;
pub use kernel::*;

use thiserror::Error;

/// 内核错误类型
///
/// 所有错误对当前安全计算会话都是致命的：份额一旦不一致便无法重试，
/// 静默继续则会泄露或破坏秘密。
#[derive(Error, Debug)]
pub enum MpcError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Invalid rank: {0}")]
    InvalidRank(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Provider violation: {0}")]
    ProviderViolation(String),
    #[error("Communication error: {0}")]
    CommunicationError(String),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl From<String> for MpcError {
    fn from(s: String) -> Self {
        MpcError::ProtocolError(s)
    }
}

impl From<&str> for MpcError {
    fn from(s: &str) -> Self {
        MpcError::ProtocolError(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MpcError>;
