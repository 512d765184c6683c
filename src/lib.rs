//! Precision File Search 的客户端：搜索会话状态机、WebSocket 传输、
//! 本地持久化（历史、保存的搜索、偏好）以及结果导出。

pub mod actions;
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod form;
pub mod history;
pub mod preferences;
pub mod saved;
pub mod session;
pub mod store;
pub mod stub;
pub mod transport;
pub mod types;
pub mod view;
