//! Mount option parsing and the mount entry point.

use std::io;
use std::path::Path;

use fuser::MountOption;

/// Filesystem name shown in the mount table unless `fsname=` overrides it.
pub const DEFAULT_FSNAME: &str = "chunkfs";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MountOptionError {
    #[error("chunkfs is read-only, refusing mount option '{0}'")]
    Writable(String),

    #[error("mount option '{0}' needs a value")]
    MissingValue(String),
}

/// Parse `-o` arguments, each a comma separated list of options.
///
/// Options fuser knows are mapped to their typed form; anything else is
/// passed through to the kernel untouched.
pub fn parse_mount_options(args: &[String]) -> Result<Vec<MountOption>, MountOptionError> {
    let mut options = Vec::new();
    for opt in args.iter().flat_map(|arg| arg.split(',')) {
        let opt = opt.trim();
        if opt.is_empty() {
            continue;
        }
        options.push(parse_option(opt)?);
    }
    Ok(options)
}

fn parse_option(opt: &str) -> Result<MountOption, MountOptionError> {
    if let Some((key, value)) = opt.split_once('=') {
        let required = || {
            if value.is_empty() {
                Err(MountOptionError::MissingValue(key.to_string()))
            } else {
                Ok(value.to_string())
            }
        };
        return Ok(match key {
            "fsname" => MountOption::FSName(required()?),
            "subtype" => MountOption::Subtype(required()?),
            _ => MountOption::CUSTOM(opt.to_string()),
        });
    }

    Ok(match opt {
        "rw" => return Err(MountOptionError::Writable(opt.to_string())),
        "ro" => MountOption::RO,
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        "dirsync" => MountOption::DirSync,
        other => MountOption::CUSTOM(other.to_string()),
    })
}

/// Final option list: always read-only, named `chunkfs` unless told otherwise.
pub fn mount_options(mut options: Vec<MountOption>) -> Vec<MountOption> {
    options.retain(|opt| *opt != MountOption::RO);
    options.insert(0, MountOption::RO);
    if !options
        .iter()
        .any(|opt| matches!(opt, MountOption::FSName(_)))
    {
        options.insert(1, MountOption::FSName(DEFAULT_FSNAME.to_string()));
    }
    options
}

/// Mount `fs` at `mountpoint` and serve requests until it is unmounted.
pub fn mount<FS, P>(fs: FS, mountpoint: P, options: &[MountOption]) -> io::Result<()>
where
    FS: fuser::Filesystem,
    P: AsRef<Path>,
{
    let mountpoint = mountpoint.as_ref();
    tracing::info!(mountpoint = %mountpoint.display(), ?options, "mounting");
    fuser::mount2(fs, mountpoint, options)?;
    tracing::info!(mountpoint = %mountpoint.display(), "unmounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_known_options() {
        let parsed = parse_mount_options(&args(&["allow_other,noatime", "fsname=disk0"])).unwrap();
        assert_eq!(
            parsed,
            vec![
                MountOption::AllowOther,
                MountOption::NoAtime,
                MountOption::FSName("disk0".into()),
            ]
        );
    }

    #[test]
    fn test_unknown_options_pass_through() {
        let parsed = parse_mount_options(&args(&["max_read=131072,weird"])).unwrap();
        assert_eq!(
            parsed,
            vec![
                MountOption::CUSTOM("max_read=131072".into()),
                MountOption::CUSTOM("weird".into()),
            ]
        );
    }

    #[test]
    fn test_empty_items_are_skipped() {
        let parsed = parse_mount_options(&args(&[",ro,,", ""])).unwrap();
        assert_eq!(parsed, vec![MountOption::RO]);
    }

    #[test]
    fn test_rw_is_refused() {
        assert_eq!(
            parse_mount_options(&args(&["allow_other,rw"])),
            Err(MountOptionError::Writable("rw".into()))
        );
    }

    #[test]
    fn test_value_required() {
        assert_eq!(
            parse_mount_options(&args(&["fsname="])),
            Err(MountOptionError::MissingValue("fsname".into()))
        );
    }

    #[test]
    fn test_mount_options_defaults() {
        let options = mount_options(Vec::new());
        assert_eq!(
            options,
            vec![
                MountOption::RO,
                MountOption::FSName(DEFAULT_FSNAME.into())
            ]
        );
    }

    #[test]
    fn test_mount_options_keep_user_choices() {
        let options = mount_options(vec![
            MountOption::AllowOther,
            MountOption::RO,
            MountOption::FSName("img".into()),
        ]);
        assert_eq!(
            options,
            vec![
                MountOption::RO,
                MountOption::AllowOther,
                MountOption::FSName("img".into()),
            ]
        );
    }
}
