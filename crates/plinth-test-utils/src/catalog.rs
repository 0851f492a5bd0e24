//! Sample plugin catalogs.
//!
//! Catalogs are TOML text so tests exercise the same loading path as the
//! binary. Commands assume a POSIX shell.

/// Three-plugin catalog: `foundation`, `lang-python` (depends on
/// foundation, has a `python_version` option) and `std-security` (depends on
/// foundation, appends a managed block to `.gitignore`).
///
/// `foundation` is detected by its marker file `.plinth-foundation`.
pub const STANDARD: &str = r#"
version = 1

[plugins.foundation]
category = "foundation"
description = "Repository basics"
declared_outputs = [".editorconfig", ".plinth-foundation"]

[[plugins.foundation.steps]]
type = "copy-file"
args = { destination = ".editorconfig", content = "root = true\n" }

[[plugins.foundation.steps]]
type = "copy-file"
args = { destination = ".plinth-foundation", content = "installed\n" }

[[plugins.foundation.probes]]
type = "file-exists"
path = ".plinth-foundation"

[plugins.lang-python]
category = "language"
description = "Python toolchain pin"
dependencies = ["foundation"]
declared_outputs = [".python-version", "src"]

[plugins.lang-python.options.python_version]
allowed = ["3.11", "3.12"]
default = "3.12"

[[plugins.lang-python.steps]]
type = "copy-file"
args = { destination = ".python-version", content = "{{python_version}}\n", template = true }

[[plugins.lang-python.steps]]
type = "ensure-directory"
args = { path = "src" }

[plugins.std-security]
category = "standard"
description = "Secret hygiene"
dependencies = ["foundation"]
declared_outputs = [".gitignore"]

[[plugins.std-security.steps]]
type = "append-file"
args = { destination = ".gitignore", content = ".env\n*.pem\n" }
"#;

/// Two plugins that both write `.editorconfig`.
pub const CONFLICTING: &str = r#"
version = 1

[plugins.style-a]
category = "standard"
declared_outputs = [".editorconfig"]

[[plugins.style-a.steps]]
type = "copy-file"
args = { destination = ".editorconfig", content = "indent_size = 2\n" }

[plugins.style-b]
category = "standard"
declared_outputs = ["./.editorconfig"]

[[plugins.style-b.steps]]
type = "copy-file"
args = { destination = ".editorconfig", content = "indent_size = 4\n" }
"#;

/// One plugin with two commands. Each command appends a line to `counter`;
/// the second fails until the file `go` exists.
pub const FLAKY: &str = r#"
version = 1

[plugins.flaky]
category = "infrastructure"

[[plugins.flaky.steps]]
type = "run-command"
args = { command = "echo first >> counter" }

[[plugins.flaky.steps]]
type = "run-command"
args = { command = "echo second >> counter && test -f go" }
"#;

/// `base` fails on its only command; `app` depends on it.
pub const FAILING_DEPENDENCY: &str = r#"
version = 1

[plugins.base]
category = "foundation"

[[plugins.base.steps]]
type = "run-command"
args = { command = "exit 3" }

[plugins.app]
category = "application"
dependencies = ["base"]
declared_outputs = ["app.txt"]

[[plugins.app.steps]]
type = "copy-file"
args = { destination = "app.txt", content = "app\n" }
"#;

/// `a -> b -> c -> a`.
pub const CYCLIC: &str = r#"
version = 1

[plugins.a]
category = "standard"
dependencies = ["b"]

[plugins.b]
category = "standard"
dependencies = ["c"]

[plugins.c]
category = "standard"
dependencies = ["a"]
"#;

/// `a` (foundation), `b` (language, depends on `a`) and `c` (application,
/// independent). Each command appends its id to `order`. Resolver order is
/// `a, b, c` while `a` and `c` share the first dependency level.
pub const ORDERED: &str = r#"
version = 1

[plugins.a]
category = "foundation"

[[plugins.a.steps]]
type = "run-command"
args = { command = "echo a >> order" }

[plugins.b]
category = "language"
dependencies = ["a"]

[[plugins.b.steps]]
type = "run-command"
args = { command = "echo b >> order" }

[plugins.c]
category = "application"

[[plugins.c.steps]]
type = "run-command"
args = { command = "echo c >> order" }
"#;

/// `pinned` renders option `v` into `v.txt`, then fails until the file `ok`
/// exists.
pub const PINNED_THEN_GATED: &str = r#"
version = 1

[plugins.pinned]
category = "standard"
declared_outputs = ["v.txt"]

[plugins.pinned.options.v]
allowed = ["1", "2"]
default = "1"

[[plugins.pinned.steps]]
type = "copy-file"
args = { destination = "v.txt", content = "{{v}}\n", template = true }

[[plugins.pinned.steps]]
type = "run-command"
args = { command = "test -f ok" }
"#;
