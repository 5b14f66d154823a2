//! Built-in package catalogue.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Where a package comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Homebrew.
    Brew,
    /// Global pnpm install.
    Pnpm,
    /// Debian packages.
    Apt,
    /// Ad-hoc shell script.
    Shell,
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Brew => "brew",
            Self::Pnpm => "pnpm",
            Self::Apt => "apt",
            Self::Shell => "shell",
        };
        f.write_str(label)
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Catalogue key.
    pub name: &'static str,
    /// Binary whose presence on `PATH` marks the package installed.
    pub command: &'static str,
    /// Shell script that installs the package.
    pub install: &'static str,
    /// Shell script that upgrades the package.
    pub upgrade: &'static str,
    /// Package origin.
    pub source: Source,
}

const fn package(
    name: &'static str,
    command: &'static str,
    install: &'static str,
    upgrade: &'static str,
    source: Source,
) -> Package {
    Package {
        name,
        command,
        install,
        upgrade,
        source,
    }
}

const BUILTIN: &[Package] = &[
    package("lazygit", "lazygit", "brew install lazygit", "brew upgrade lazygit", Source::Brew),
    package(
        "crush",
        "crush",
        "brew install charmbracelet/tap/crush",
        "brew upgrade charmbracelet/tap/crush",
        Source::Brew,
    ),
    package(
        "qwen",
        "qwen",
        "pnpm add -g @qwen-code/qwen-code",
        "pnpm upgrade -g @qwen-code/qwen-code",
        Source::Pnpm,
    ),
    package(
        "gemini",
        "gemini",
        "pnpm add -g @google/gemini-cli",
        "pnpm upgrade -g @google/gemini-cli",
        Source::Pnpm,
    ),
    package("codex", "codex", "pnpm add -g @openai/codex", "pnpm upgrade -g @openai/codex", Source::Pnpm),
    package(
        "opencode",
        "opencode",
        "brew install anomalyco/tap/opencode",
        "brew upgrade anomalyco/tap/opencode",
        Source::Brew,
    ),
    package(
        "starship",
        "starship",
        "curl -sS https://starship.rs/install.sh | sh",
        "brew upgrade starship 2>/dev/null || curl -sS https://starship.rs/install.sh | sh",
        Source::Shell,
    ),
    package(
        "bat",
        "bat",
        "(set -e; cd /tmp; curl -sSL -o bat.deb https://github.com/sharkdp/bat/releases/download/v0.22.1/bat-musl_0.22.1_amd64.deb; sudo dpkg -i bat.deb; rm bat.deb)",
        "brew upgrade bat 2>/dev/null || (set -e; cd /tmp; curl -sSL -o bat.deb https://github.com/sharkdp/bat/releases/download/v0.22.1/bat-musl_0.22.1_amd64.deb; sudo dpkg -i bat.deb; rm bat.deb)",
        Source::Shell,
    ),
    package(
        "csvtk",
        "csvtk",
        "curl -sSL -o - https://github.com/shenwei356/csvtk/releases/download/v0.25.0/csvtk_linux_amd64.tar.gz | sudo tar -xz --directory=/usr/local/bin",
        "curl -sSL -o - https://github.com/shenwei356/csvtk/releases/download/v0.25.0/csvtk_linux_amd64.tar.gz | sudo tar -xz --directory=/usr/local/bin",
        Source::Shell,
    ),
    package(
        "docker",
        "docker",
        "curl -sSL https://get.docker.com/ | sudo sh",
        "apt upgrade docker-ce 2>/dev/null || brew upgrade docker 2>/dev/null || curl -sSL https://get.docker.com/ | sudo sh",
        Source::Shell,
    ),
    package(
        "fd",
        "fd",
        "(set -e; cd /tmp; curl -sSL -o fd.deb https://github.com/sharkdp/fd/releases/download/v8.4.0/fd-musl_8.4.0_amd64.deb; sudo dpkg -i fd.deb; rm fd.deb)",
        "brew upgrade fd 2>/dev/null || (set -e; cd /tmp; curl -sSL -o fd.deb https://github.com/sharkdp/fd/releases/download/v8.4.0/fd-musl_8.4.0_amd64.deb; sudo dpkg -i fd.deb; rm fd.deb)",
        Source::Shell,
    ),
    package(
        "fly",
        "flyctl",
        "curl -L https://fly.io/install.sh | sh",
        "brew upgrade flyctl 2>/dev/null || curl -L https://fly.io/install.sh | sh",
        Source::Shell,
    ),
    package(
        "fzf",
        "fzf",
        "(set -e; cd; git clone https://github.com/junegunn/fzf.git .fzf; cd .fzf; ./install)",
        "brew upgrade fzf 2>/dev/null || (cd ~/.fzf && git pull && ./install)",
        Source::Shell,
    ),
    package(
        "pnpm",
        "pnpm",
        "curl -fsSL https://get.pnpm.io/install.sh | sh -",
        "pnpm self-update",
        Source::Shell,
    ),
    package(
        "lsd",
        "lsd",
        "(set -e; curl -sSL -o lsd.deb https://github.com/Peltoche/lsd/releases/download/0.23.1/lsd_0.23.1_amd64.deb; sudo dpkg -i lsd.deb; rm lsd.deb)",
        "brew upgrade lsd 2>/dev/null || (set -e; curl -sSL -o lsd.deb https://github.com/Peltoche/lsd/releases/download/0.23.1/lsd_0.23.1_amd64.deb; sudo dpkg -i lsd.deb; rm lsd.deb)",
        Source::Shell,
    ),
    package(
        "ripgrep",
        "rg",
        "apt install ripgrep 2>/dev/null || brew install ripgrep",
        "apt upgrade ripgrep 2>/dev/null || brew upgrade ripgrep",
        Source::Apt,
    ),
    package(
        "tmux",
        "tmux",
        "apt install tmux 2>/dev/null || brew install tmux",
        "apt upgrade tmux 2>/dev/null || brew upgrade tmux",
        Source::Apt,
    ),
    package(
        "neovim",
        "nvim",
        "apt install neovim 2>/dev/null || brew install neovim",
        "apt upgrade neovim 2>/dev/null || brew upgrade neovim",
        Source::Apt,
    ),
];

/// Known packages, keyed by name.
#[derive(Debug, Clone)]
pub struct Catalogue {
    packages: Vec<Package>,
}

impl Catalogue {
    /// The embedded package list.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_packages(BUILTIN.to_vec())
    }

    /// Builds a catalogue from explicit entries, sorted by name.
    #[must_use]
    pub fn from_packages(mut packages: Vec<Package>) -> Self {
        packages.sort_by_key(|package| package.name);
        packages.dedup_by_key(|package| package.name);
        Self { packages }
    }

    /// Looks up a package by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages
            .binary_search_by_key(&name, |package| package.name)
            .ok()
            .map(|index| &self.packages[index])
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }
}
