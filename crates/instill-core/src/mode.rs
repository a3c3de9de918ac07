/// Operation mode passed to every action run.
///
/// Fixed as install or uninstall at construction; the derived flags are
/// set through the consuming builders before the operation starts and the
/// value never changes while actions execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    install: bool,
    upgrade: bool,
    update: bool,
    patch: bool,
    root_uninstall: bool,
}

impl Mode {
    pub fn install() -> Self {
        Self {
            install: true,
            upgrade: false,
            update: false,
            patch: false,
            root_uninstall: false,
        }
    }

    pub fn uninstall() -> Self {
        Self {
            install: false,
            upgrade: false,
            update: false,
            patch: false,
            root_uninstall: false,
        }
    }

    /// A patch always re-installs into an existing product, so it is also
    /// an update.
    pub fn patch() -> Self {
        let mut mode = Self::install();
        mode.patch = true;
        mode.update = true;
        mode
    }

    pub fn upgrading(mut self) -> Self {
        if self.install {
            self.upgrade = true;
        }
        self
    }

    pub fn updating(mut self) -> Self {
        if self.install {
            self.update = true;
        }
        self
    }

    pub fn root_uninstalling(mut self) -> Self {
        if !self.install {
            self.root_uninstall = true;
        }
        self
    }

    /// The same operation flags, flipped to uninstall. Used for the
    /// rollback and upgrade-replacement passes.
    pub fn to_uninstall(mut self) -> Self {
        self.install = false;
        self
    }

    pub fn is_install(&self) -> bool {
        self.install
    }

    pub fn is_uninstall(&self) -> bool {
        !self.install
    }

    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    pub fn is_update(&self) -> bool {
        self.update
    }

    pub fn is_patch(&self) -> bool {
        self.patch
    }

    pub fn is_root_uninstall(&self) -> bool {
        self.root_uninstall
    }
}
