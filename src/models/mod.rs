//! 数据模型模块
//! 用户、角色权限与令牌

pub mod auth;
pub mod role;
pub mod token;
pub mod user;
