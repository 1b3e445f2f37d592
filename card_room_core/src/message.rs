use crate::card::Card;
use crate::state::{Player, PlayerId, PlayerSummary};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的消息 ---
// 这些是客户端可以发送给服务器的指令或动作。
// 断线没有对应消息：由传输层关闭连接隐式触发。

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientMessage {
    /// 客户端请求入座，可附带昵称
    Join { name: Option<String> },
    /// 玩家宣告已准备
    Ready,
    /// 轮到自己时出牌，给出手牌中的位置索引（按出牌时刻计）
    Play { indices: Vec<usize> },
}

// --- 服务器 -> 客户端 的消息 ---
// 这些是服务器在房间状态改变后发出的事件通知。
// 标注"仅请求者"的消息只发给发起请求的连接，其余广播给整个房间。

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ServerMessage {
    /// 入座成功，私密地发给该玩家本人的完整记录（仅请求者）
    Joined { player: Player },

    /// 房间已满，入座被拒（仅请求者）
    RoomFull,

    /// 牌局进行中，入座被拒（仅请求者）
    GameInProgress,

    /// 花名册变更：座位顺序的 (id, 昵称, 准备状态, 手牌张数)
    RosterUpdated { players: Vec<PlayerSummary> },

    /// 新的一局开始。每个玩家单独收到自己的私有手牌，
    /// 手牌绝不广播给其他人。
    RoundStarted {
        hand: Vec<Card>,
        current_turn: PlayerId,
    },

    /// 公开状态同步：花名册 + 当前行动者
    StateUpdated {
        players: Vec<PlayerSummary>,
        current_turn: Option<PlayerId>,
    },

    /// 有玩家出了牌，附带具体牌面
    CardsPlayed {
        player_id: PlayerId,
        player_name: String,
        cards: Vec<Card>,
    },

    /// 本局结束，公布赢家昵称
    RoundEnded { winner: String },

    /// 本局被中止，附带可读的原因
    RoundAborted { reason: String },

    /// 服务器向特定客户端返回错误信息（仅请求者）
    Error { message: String },
}

// --- 单元测试 ---
