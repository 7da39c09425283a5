//! lmkdctl: poke lmkd from a shell.
//!
//! Usage:
//!     lmkdctl register <pid> <uid> <oomadj> [app|service]
//!     lmkdctl unregister <pid>
//!     lmkdctl update-props
//!     lmkdctl memcg-dir
//!     lmkdctl create-memcg <uid> <pid> [apps_dir]
//!
//! The socket path comes from `LMKD_SOCKET_PATH` (default
//! `/dev/socket/lmkd`); log verbosity from `LMKD_LOG_LEVEL`.

use std::process::ExitCode;
use std::str::FromStr;

use lmkd_client::{
    connect_to, create_memcg, memcg_apps_dir, register_process, unregister_process, update_props,
    UpdatePropsResult,
};
use lmkd_core::config::LmkdConfig;
use lmkd_core::error::LmkdResult;
use lmkd_core::packet::{ProcPrio, ProcRemove, ProcType};
use lmkd_core::{alogd, aloge, alogi};

const USAGE: &str = "\
usage: lmkdctl <command> [args]

commands:
  register <pid> <uid> <oomadj> [app|service]
  unregister <pid>
  update-props
  memcg-dir
  create-memcg <uid> <pid> [apps_dir]";

fn arg<T: FromStr>(args: &[String], idx: usize, name: &str) -> Result<T, String> {
    let raw = args.get(idx).ok_or_else(|| format!("missing <{}>", name))?;
    raw.parse()
        .map_err(|_| format!("invalid <{}>: {}", name, raw))
}

fn run(args: &[String]) -> Result<(), String> {
    let Some(cmd) = args.get(1) else {
        return Err(USAGE.to_string());
    };

    match cmd.as_str() {
        "register" => {
            let params = ProcPrio {
                pid: arg(args, 2, "pid")?,
                uid: arg(args, 3, "uid")?,
                oomadj: arg(args, 4, "oomadj")?,
                ptype: match args.get(5) {
                    Some(_) => arg(args, 5, "app|service")?,
                    None => ProcType::App,
                },
            };
            with_socket(|sock| register_process(sock, &params))?;
            alogi!("registered pid {} (uid {}, oomadj {})", params.pid, params.uid, params.oomadj);
        }
        "unregister" => {
            let params = ProcRemove { pid: arg(args, 2, "pid")? };
            with_socket(|sock| unregister_process(sock, &params))?;
            alogi!("unregistered pid {}", params.pid);
        }
        "update-props" => {
            let result = with_socket(|sock| Ok(update_props(sock)))?;
            match result {
                UpdatePropsResult::Success => println!("lmkd reloaded its properties"),
                other => return Err(other.to_string()),
            }
        }
        "memcg-dir" => println!("{}", memcg_apps_dir()),
        "create-memcg" => {
            let uid: u32 = arg(args, 2, "uid")?;
            let pid: i32 = arg(args, 3, "pid")?;
            let apps_dir: &str = match args.get(4) {
                Some(dir) => dir,
                None => memcg_apps_dir(),
            };
            create_memcg(apps_dir, uid, pid).map_err(|e| format!("{} (code {})", e, e.code()))?;
            alogi!("moved pid {} into {}/uid_{}/pid_{}", pid, apps_dir, uid, pid);
        }
        "-h" | "--help" | "help" => println!("{}", USAGE),
        other => return Err(format!("unknown command '{}'\n{}", other, USAGE)),
    }
    Ok(())
}

/// Connect, run `f`, and close the socket again.
fn with_socket<T>(f: impl FnOnce(&std::os::fd::OwnedFd) -> LmkdResult<T>) -> Result<T, String> {
    let config = LmkdConfig::from_env();
    config.validate().map_err(|e| e.to_string())?;
    alogd!("connecting to {}", config.socket_path.display());

    let sock = connect_to(&config.socket_path).map_err(|e| e.to_string())?;
    f(&sock).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            aloge!("{}", msg);
            ExitCode::FAILURE
        }
    }
}
