//! Remote transfer and execution.
//!
//! Every operation starts one or more local programs (`rsync`, `ssh`) and
//! hands back a [`ProcessHandle`] that is polled to completion.
//!
//! Exit codes the orchestrator interprets:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | success |
//! | 23   | transfer matched no files; nothing is ready yet |
//! | 127  | remote interpreter or tool missing |
//! | 1    | (dispatch only) some frames failed remotely |

mod command;
mod errors;
mod gateway;
mod process;

pub use command::{shell_join, shell_quote, CommandSpec, RemoteExec, SyncCommand, SyncOptions};
pub use errors::{RemoteError, RemoteResult};
pub use gateway::{write_servers_file, GatewayConfig, RemoteSyncGateway, BACKUP_DIR, SERVERS_FILE};
pub use process::{
    ChildProcess, ProcessChain, ProcessExit, ProcessHandle, ProcessPoll, Spawner, SystemSpawner,
};

/// Transfer matched no files.
pub const EXIT_NO_FILES_MATCHED: i32 = 23;

/// Remote interpreter or tool not found.
pub const EXIT_TOOL_MISSING: i32 = 127;

/// Dispatcher finished with some frames failed.
pub const EXIT_PARTIAL_FAILURE: i32 = 1;
