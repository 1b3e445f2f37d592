use thiserror::Error;

/// 房间状态机的错误分类。
///
/// 入座阶段的错误 (`RoomFull` / `GameInProgress`) 只会回给发起请求的
/// 连接，绝不影响其他玩家。出牌阶段的前置条件失败同样作为可恢复
/// 错误返回给行动者，而不是静默丢弃请求。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// 房间人数已达上限
    #[error("房间已满")]
    RoomFull,

    /// 一局已经开始，中途不能加入
    #[error("牌局进行中，无法加入")]
    GameInProgress,

    /// 还没轮到该玩家行动
    #[error("还没轮到你出牌")]
    NotYourTurn,

    /// 没有进行中的牌局
    #[error("当前没有进行中的牌局")]
    RoundNotActive,

    /// 出牌索引为空、重复或越界
    #[error("出牌选择不合法")]
    InvalidSelection,

    /// 该连接对应的玩家已不在座位上
    #[error("玩家不在房间里")]
    UnknownPlayer,
}
