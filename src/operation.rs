use std::fmt::{Display, Formatter};

/// Every filesystem action the benchmark can issue.
///
/// Declaration order is the reporting order and the order the selector lays
/// out its cumulative table in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    Create,
    Append,
    Read,
    Rename,
    Delete,
    ListFile,
    ListDir,
    ChmodFile,
    ChmodDir,
    Mkdir,
    SetReplication,
    StatFile,
    StatDir,
}

impl OperationKind {
    pub const COUNT: usize = 13;

    pub const ALL: [OperationKind; OperationKind::COUNT] = [
        OperationKind::Create,
        OperationKind::Append,
        OperationKind::Read,
        OperationKind::Rename,
        OperationKind::Delete,
        OperationKind::ListFile,
        OperationKind::ListDir,
        OperationKind::ChmodFile,
        OperationKind::ChmodDir,
        OperationKind::Mkdir,
        OperationKind::SetReplication,
        OperationKind::StatFile,
        OperationKind::StatDir,
    ];

    /// Position of this kind in [`OperationKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Append => "append",
            OperationKind::Read => "read",
            OperationKind::Rename => "rename",
            OperationKind::Delete => "delete",
            OperationKind::ListFile => "ls-file",
            OperationKind::ListDir => "ls-dir",
            OperationKind::ChmodFile => "chmod-file",
            OperationKind::ChmodDir => "chmod-dir",
            OperationKind::Mkdir => "mkdir",
            OperationKind::SetReplication => "set-replication",
            OperationKind::StatFile => "stat-file",
            OperationKind::StatDir => "stat-dir",
        }
    }

    /// Kinds that need a path nobody has used yet.
    pub fn needs_fresh_path(self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Mkdir)
    }

    /// Kinds that operate on an existing directory rather than a file.
    pub fn targets_dir(self) -> bool {
        matches!(
            self,
            OperationKind::ListDir | OperationKind::ChmodDir | OperationKind::StatDir
        )
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
