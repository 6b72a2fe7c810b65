//! Name policies: which identifiers count as cross-cell data flow.
//!
//! The analyzer asks a [`NamePolicy`] about every binding and use it finds.
//! Swapping the policy changes what gets wired without touching the graph
//! algorithm.

use std::collections::BTreeSet;

/// Decides which names are local noise and which are builtins.
pub trait NamePolicy: Send + Sync {
    /// Names excluded from both bindings and uses.
    fn is_noise(&self, name: &str) -> bool;

    /// Names always available without a producing cell.
    fn is_builtin(&self, name: &str) -> bool {
        is_python_builtin(name)
    }
}

/// Conventional temporaries and loop variables.
const TEMP_NAMES: &[&str] = &["i", "idx", "index", "j", "k", "temp", "tmp"];

/// The default policy: underscore-private names, conventional temporaries
/// and all-uppercase constants are local to their cell.
#[derive(Debug, Clone)]
pub struct ReservedNames {
    temp_names: BTreeSet<String>,
    private_prefix: bool,
    constants: bool,
}

impl ReservedNames {
    pub fn new() -> Self {
        Self {
            temp_names: TEMP_NAMES.iter().map(|s| s.to_string()).collect(),
            private_prefix: true,
            constants: true,
        }
    }

    /// Add a name to the temporary set.
    pub fn with_temp_name(mut self, name: impl Into<String>) -> Self {
        self.temp_names.insert(name.into());
        self
    }

    /// Whether `_`-prefixed names are private to their cell.
    pub fn with_private_prefix(mut self, enabled: bool) -> Self {
        self.private_prefix = enabled;
        self
    }

    /// Whether all-uppercase names are treated as cell-local constants.
    pub fn with_constants(mut self, enabled: bool) -> Self {
        self.constants = enabled;
        self
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::new()
    }
}

impl NamePolicy for ReservedNames {
    fn is_noise(&self, name: &str) -> bool {
        name == "_"
            || (self.private_prefix && name.starts_with('_'))
            || self.temp_names.contains(name)
            || (self.constants && is_constant_style(name))
    }
}

/// No noise filtering at all; only builtins are dropped from uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl NamePolicy for KeepAll {
    fn is_noise(&self, _name: &str) -> bool {
        false
    }
}

/// Explicitly allowed names override an inner policy's noise verdict.
pub struct AllowList {
    allowed: BTreeSet<String>,
    inner: Box<dyn NamePolicy>,
}

impl AllowList {
    pub fn new<I, S>(allowed: I, inner: impl NamePolicy + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            inner: Box::new(inner),
        }
    }
}

impl NamePolicy for AllowList {
    fn is_noise(&self, name: &str) -> bool {
        !self.allowed.contains(name) && self.inner.is_noise(name)
    }

    fn is_builtin(&self, name: &str) -> bool {
        self.inner.is_builtin(name)
    }
}

impl std::fmt::Debug for AllowList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowList")
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

/// Python's `str.isupper()`: at least one cased character, none lowercase.
fn is_constant_style(name: &str) -> bool {
    name.chars().any(char::is_uppercase) && !name.chars().any(char::is_lowercase)
}

/// Builtins, plus the names IPython injects into every notebook namespace.
/// Kept sorted for binary search.
const PYTHON_BUILTINS: &[&str] = &[
    "ArithmeticError", "AssertionError", "AttributeError", "BaseException",
    "BaseExceptionGroup", "BlockingIOError", "BrokenPipeError", "BufferError", "BytesWarning",
    "ChildProcessError", "ConnectionAbortedError", "ConnectionError", "ConnectionRefusedError",
    "ConnectionResetError", "DeprecationWarning", "EOFError", "Ellipsis", "EncodingWarning",
    "EnvironmentError", "Exception", "ExceptionGroup", "False", "FileExistsError",
    "FileNotFoundError", "FloatingPointError", "FutureWarning", "GeneratorExit", "IOError",
    "ImportError", "ImportWarning", "IndentationError", "IndexError", "InterruptedError",
    "IsADirectoryError", "KeyError", "KeyboardInterrupt", "LookupError", "MemoryError",
    "ModuleNotFoundError", "NameError", "None", "NotADirectoryError", "NotImplemented",
    "NotImplementedError", "OSError", "OverflowError", "PendingDeprecationWarning",
    "PermissionError", "ProcessLookupError", "RecursionError", "ReferenceError",
    "ResourceWarning", "RuntimeError", "RuntimeWarning", "StopAsyncIteration", "StopIteration",
    "SyntaxError", "SyntaxWarning", "SystemError", "SystemExit", "TabError", "TimeoutError",
    "True", "TypeError", "UnboundLocalError", "UnicodeDecodeError", "UnicodeEncodeError",
    "UnicodeError", "UnicodeTranslateError", "UnicodeWarning", "UserWarning", "ValueError",
    "Warning", "ZeroDivisionError", "__build_class__", "__builtins__", "__debug__", "__doc__",
    "__file__", "__import__", "__name__", "__spec__", "abs", "aiter", "all", "anext", "any",
    "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes", "callable", "chr",
    "classmethod", "compile", "complex", "copyright", "credits", "delattr", "dict", "dir",
    "display", "divmod", "enumerate", "eval", "exec", "exit", "filter", "float", "format",
    "frozenset", "get_ipython", "getattr", "globals", "hasattr", "hash", "help", "hex", "id",
    "input", "int", "isinstance", "issubclass", "iter", "len", "license", "list", "locals",
    "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow", "print",
    "property", "quit", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

/// Whether `name` is a Python (or IPython-injected) builtin.
pub fn is_python_builtin(name: &str) -> bool {
    PYTHON_BUILTINS.binary_search(&name).is_ok()
}
