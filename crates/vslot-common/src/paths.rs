use std::path::PathBuf;

fn xdg_dir(var: &str, home_suffix: &[&str]) -> PathBuf {
    if let Ok(dir) = std::env::var(var) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return home_suffix
            .iter()
            .fold(PathBuf::from(home), |path, part| path.join(part));
    }
    PathBuf::from("/tmp")
}

pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
}

pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}

pub fn vslot_config_dir() -> PathBuf {
    config_dir().join("vslot")
}

pub fn vslot_data_dir() -> PathBuf {
    data_dir().join("vslot")
}

pub fn vslot_log_dir() -> PathBuf {
    vslot_data_dir().join("logs")
}
