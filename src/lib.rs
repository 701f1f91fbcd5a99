//! Compiles audience builder filters ("Average visits is greater than 3",
//! "Membership status is Joined", ...) into one parameterized query over the
//! car wash point-of-sale views.

pub mod ast;
pub mod config;
pub mod describe;
pub mod dictionary;
pub mod operator;
pub mod schema;
pub mod sql_compiler;
pub mod status;

pub use ast::{FilterInput, FilterValue, Scalar, TimeUnit, VisitWindow};
pub use config::{CompilerConfig, ConfigError};
pub use operator::Operator;
pub use sql_compiler::{
    build_query, BuildResult, Clause, SqlCompiler, UnresolvedFilter, UnresolvedFilterReason,
};
