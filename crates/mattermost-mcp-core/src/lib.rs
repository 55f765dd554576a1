//! Core types for mattermost-mcp.
//!
//! This crate holds everything the other workspace crates agree on:
//!
//! - [`AccessMode`] and [`TransportMode`], the two primitives that decide which
//!   tools and argument fields a caller may use
//! - [`Config`], the validated runtime configuration
//! - [`MattermostClient`], the contract of the Mattermost REST collaborator,
//!   together with its model types and a thin HTTP adapter ([`RestClient`])

pub mod access;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod rest;

pub use access::{AccessMode, TransportMode};
pub use client::{ClientFactory, MattermostClient};
pub use config::Config;
pub use error::{ApiError, ApiResult, ConfigError, ConfigResult};
pub use model::{
    Channel, ChannelMember, ChannelType, FileInfo, NewChannel, NewPost, NewTeam, NewUser, Post,
    PostList, Team, TeamMember, User,
};
pub use rest::{RestClient, RestClientFactory};
