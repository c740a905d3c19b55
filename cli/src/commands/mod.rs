mod browse;
mod helpers;
mod list;
mod sync;

pub(crate) use browse::{cmd_browse, lock};
pub(crate) use list::{cmd_list, cmd_show, cmd_tags};
pub(crate) use sync::cmd_sync;
