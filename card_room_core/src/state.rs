use crate::card::Card;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PlayerId = Uuid;

/// 每个房间最多容纳的玩家数
pub const ROOM_CAPACITY: usize = 4;

/// 房间的单例聚合状态。
///
/// 进程启动时创建一次，由服务端持有并以句柄形式传入网关，
/// 所有 §状态机 转换都通过它进行。`players` 的顺序就是座位顺序
/// （即加入顺序），出牌轮转按这个顺序进行。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomState {
    pub players: Vec<Player>, // 座位顺序 = 加入顺序
    pub capacity: usize,
    pub in_progress: bool,
    // 当前应该行动的玩家。不变式：Some 时必须指向 players 中的玩家；
    // in_progress == false 时必须为 None。
    pub current_turn: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    // 开局发一次，之后随出牌单调缩短，永不增长
    pub hand: Vec<Card>,
    pub ready: bool,
}

/// 公开的花名册条目。只暴露手牌张数，绝不暴露手牌内容 —
/// 手牌只私发给持有者本人，这是保密性不变式而不只是UI约定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub card_count: usize,
}

/// 只读的房间快照，供非实时的状态查询接口使用
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomStatus {
    pub player_count: usize,
    pub capacity: usize,
    pub in_progress: bool,
}

// --- RoomState 的实现方法 ---

impl RoomState {
    pub fn new() -> Self {
        RoomState {
            players: Vec::new(),
            capacity: ROOM_CAPACITY,
            in_progress: false,
            current_turn: None,
        }
    }

    /// 按座位顺序生成公开花名册
    pub fn roster(&self) -> Vec<PlayerSummary> {
        self.players
            .iter()
            .map(|p| PlayerSummary {
                id: p.id,
                name: p.name.clone(),
                ready: p.ready,
                card_count: p.hand.len(),
            })
            .collect()
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            player_count: self.players.len(),
            capacity: self.capacity,
            in_progress: self.in_progress,
        }
    }

    /// 查找玩家的座位索引
    pub(crate) fn seat_of(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}
