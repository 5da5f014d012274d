//! # 通信模块 (Communicator Module)
//!
//! 点对点发送/接收与集合通信（all-reduce 求和、gather）。参与方之间以
//! 锁步方式协作：每一方必须以相同的顺序、相同的标签字符串执行相同的
//! 集合通信序列。收到的消息标签与期望不符即视为锁步被破坏，属于致命的
//! 通信错误。
//!
//! 内核眼中的传输层只是 [`Communicator`] 的方法表面；[`LocalMesh`] 提供
//! 一个进程内的全连接实现（每个参与方一个线程，mpsc 通道互联），线上
//! 负载用 bincode 编码的线格式张量传输。

use crate::ring::{ops, ElementType, RingField, Tensor};
use crate::{MpcError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::trace;

/// 线格式张量：环域 + 形状 + 小端字节负载
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTensor {
    pub field: RingField,
    pub shape: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl WireTensor {
    pub fn pack(t: &Tensor) -> WireTensor {
        WireTensor {
            field: t.field(),
            shape: t.shape().to_vec(),
            bytes: t.to_le_bytes(),
        }
    }

    pub fn unpack(self) -> Result<Tensor> {
        Tensor::from_le_bytes(ElementType::Ring(self.field), &self.shape, &self.bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    tag: String,
    payload: Vec<u8>,
}

/// 通信统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommStats {
    /// 集合通信与点对点往返的轮数
    pub rounds: u64,
    /// 发出的负载字节数
    pub bytes: u64,
}

/// 参与方的通信端点
///
/// 由单个求值线程独占使用；计数器使用原子量，快照读取无需额外同步。
pub struct Communicator {
    rank: usize,
    world: usize,
    senders: Vec<Option<Sender<Message>>>,
    receivers: Vec<Option<Receiver<Message>>>,
    rounds: AtomicU64,
    bytes: AtomicU64,
}

impl Communicator {
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn world_size(&self) -> usize {
        self.world
    }

    #[inline]
    pub fn next_rank(&self) -> usize {
        (self.rank + 1) % self.world
    }

    #[inline]
    pub fn prev_rank(&self) -> usize {
        (self.rank + self.world - 1) % self.world
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.world || peer == self.rank {
            return Err(MpcError::InvalidRank(format!(
                "peer {} is not addressable from rank {} of {}",
                peer, self.rank, self.world
            )));
        }
        Ok(())
    }

    /// 向对端发送一个带标签的张量（非阻塞）
    pub fn send_async(&self, peer: usize, t: &Tensor, tag: &str) -> Result<()> {
        self.check_peer(peer)?;
        let payload = bincode::serialize(&WireTensor::pack(t))
            .map_err(|e| MpcError::CommunicationError(format!("encode failed: {e}")))?;
        self.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
        trace!(tag, peer, numel = t.numel(), "send");
        self.senders[peer]
            .as_ref()
            .expect("peer channel missing")
            .send(Message {
                tag: tag.to_string(),
                payload,
            })
            .map_err(|_| MpcError::CommunicationError(format!("peer {peer} hung up on '{tag}'")))
    }

    /// 从对端接收一个带标签的张量（阻塞）
    ///
    /// 标签不匹配说明双方的集合通信序列已经分叉，会话不可再用。
    pub fn recv(&self, peer: usize, tag: &str) -> Result<Tensor> {
        self.check_peer(peer)?;
        let msg = self.receivers[peer]
            .as_ref()
            .expect("peer channel missing")
            .recv()
            .map_err(|_| MpcError::CommunicationError(format!("peer {peer} hung up on '{tag}'")))?;
        if msg.tag != tag {
            return Err(MpcError::CommunicationError(format!(
                "lock-step violated: expected tag '{}', got '{}' from peer {}",
                tag, msg.tag, peer
            )));
        }
        let wire: WireTensor = bincode::deserialize(&msg.payload)
            .map_err(|e| MpcError::CommunicationError(format!("decode failed: {e}")))?;
        wire.unpack()
    }

    /// 全体求和归约：返回 Σ 各方张量，所有参与方得到同一结果
    pub fn all_reduce_sum(&self, t: &Tensor, tag: &str) -> Result<Tensor> {
        self.rounds.fetch_add(1, Ordering::Relaxed);
        trace!(tag, numel = t.numel(), "all_reduce");
        for peer in 0..self.world {
            if peer != self.rank {
                self.send_async(peer, t, tag)?;
            }
        }
        let mut acc = t.clone();
        for peer in 0..self.world {
            if peer != self.rank {
                let other = self.recv(peer, tag)?;
                acc = ops::add(&acc, &other.as_type(acc.ty())?)?;
            }
        }
        Ok(acc)
    }

    /// 将各方张量收集到 root；root 得到按秩排序的全部张量，其余方得到 None
    pub fn gather(&self, t: &Tensor, root: usize, tag: &str) -> Result<Option<Vec<Tensor>>> {
        if root >= self.world {
            return Err(MpcError::InvalidRank(format!(
                "gather root {} out of world {}",
                root, self.world
            )));
        }
        self.rounds.fetch_add(1, Ordering::Relaxed);
        if self.rank != root {
            self.send_async(root, t, tag)?;
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(self.world);
        for peer in 0..self.world {
            if peer == self.rank {
                parts.push(t.clone());
            } else {
                parts.push(self.recv(peer, tag)?.as_type(t.ty())?);
            }
        }
        Ok(Some(parts))
    }

    /// 手工补记通信量（供把若干点对点消息折算成一轮的协议使用）
    pub fn add_comm_stats_manually(&self, rounds: u64, bytes: u64) {
        self.rounds.fetch_add(rounds, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// 当前统计快照
    pub fn stats(&self) -> CommStats {
        CommStats {
            rounds: self.rounds.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// 进程内全连接网格
///
/// 为 n 个参与方构造两两互联的通道并返回 n 个通信端点，
/// 每个端点交给对应参与方的线程独占使用。
pub struct LocalMesh;

impl LocalMesh {
    pub fn connect(world: usize) -> Vec<Communicator> {
        assert!(world >= 2, "a mesh needs at least two parties");
        // tx[i][j] 发往 i -> j，rx[j][i] 是其接收端
        let mut txs: Vec<Vec<Option<Sender<Message>>>> = (0..world)
            .map(|_| (0..world).map(|_| None).collect())
            .collect();
        let mut rxs: Vec<Vec<Option<Receiver<Message>>>> = (0..world)
            .map(|_| (0..world).map(|_| None).collect())
            .collect();
        for i in 0..world {
            for j in 0..world {
                if i != j {
                    let (tx, rx) = channel();
                    txs[i][j] = Some(tx);
                    rxs[j][i] = Some(rx);
                }
            }
        }
        txs.into_iter()
            .zip(rxs)
            .enumerate()
            .map(|(rank, (senders, receivers))| Communicator {
                rank,
                world,
                senders,
                receivers,
                rounds: AtomicU64::new(0),
                bytes: AtomicU64::new(0),
            })
            .collect()
    }
}
