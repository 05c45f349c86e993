//! λ-calculus terms: the boundary AST on both sides of the net.
//!
//! The display syntax follows the reducer's surface notation: `(x: body)`
//! for abstraction, `(f a)` for application, `let x = v; body` for the
//! let-sugar. Comparison for tests is α-canonical: bound names are renamed
//! to `x0, x1, …` in traversal order, free names are kept as written.

use std::fmt;

/// A λ-term. `Let` is sugar for `(λname. body) val` and is desugared by the
/// translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Variable occurrence, bound or free.
    Var(String),
    /// Abstraction.
    Abs { arg: String, body: Box<Term> },
    /// Application.
    App { fun: Box<Term>, arg: Box<Term> },
    /// Let binding.
    Let {
        name: String,
        val: Box<Term>,
        body: Box<Term>,
    },
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn abs(arg: impl Into<String>, body: Term) -> Self {
        Term::Abs {
            arg: arg.into(),
            body: Box::new(body),
        }
    }

    pub fn app(fun: Term, arg: Term) -> Self {
        Term::App {
            fun: Box::new(fun),
            arg: Box::new(arg),
        }
    }

    pub fn let_(name: impl Into<String>, val: Term, body: Term) -> Self {
        Term::Let {
            name: name.into(),
            val: Box::new(val),
            body: Box::new(body),
        }
    }

    /// Replaces every `Let` with its application form.
    pub fn desugared(&self) -> Term {
        match self {
            Term::Var(name) => Term::Var(name.clone()),
            Term::Abs { arg, body } => Term::abs(arg.clone(), body.desugared()),
            Term::App { fun, arg } => Term::app(fun.desugared(), arg.desugared()),
            Term::Let { name, val, body } => Term::app(
                Term::abs(name.clone(), body.desugared()),
                val.desugared(),
            ),
        }
    }

    /// True if `name` occurs free in this term.
    pub fn occurs_free(&self, name: &str) -> bool {
        match self {
            Term::Var(v) => v == name,
            Term::Abs { arg, body } => arg != name && body.occurs_free(name),
            Term::App { fun, arg } => fun.occurs_free(name) || arg.occurs_free(name),
            Term::Let { name: n, val, body } => {
                val.occurs_free(name) || (n != name && body.occurs_free(name))
            }
        }
    }

    /// Renames bound variables to `x0, x1, …` in traversal order. Free
    /// variables keep their names. Lets are desugared first.
    pub fn alpha_canonical(&self) -> Term {
        fn walk(
            term: &Term,
            bindings: &mut Vec<(String, String)>,
            counter: &mut usize,
        ) -> Term {
            match term {
                Term::Var(name) => {
                    let canon = bindings
                        .iter()
                        .rev()
                        .find(|(original, _)| original == name)
                        .map(|(_, canon)| canon.clone())
                        .unwrap_or_else(|| name.clone());
                    Term::Var(canon)
                }
                Term::Abs { arg, body } => {
                    let canon = format!("x{}", *counter);
                    *counter += 1;
                    bindings.push((arg.clone(), canon.clone()));
                    let body = walk(body, bindings, counter);
                    bindings.pop();
                    Term::abs(canon, body)
                }
                Term::App { fun, arg } => Term::app(
                    walk(fun, bindings, counter),
                    walk(arg, bindings, counter),
                ),
                Term::Let { .. } => unreachable!("desugared before canonicalisation"),
            }
        }
        let desugared = self.desugared();
        walk(&desugared, &mut Vec::new(), &mut 0)
    }

    /// α-equivalence: equal after canonical renaming of bound variables.
    pub fn alpha_eq(&self, other: &Term) -> bool {
        self.alpha_canonical() == other.alpha_canonical()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => f.write_str(name),
            Term::Abs { arg, body } => write!(f, "({}: {})", arg, body),
            Term::App { fun, arg } => write!(f, "({} {})", fun, arg),
            Term::Let { name, val, body } => write!(f, "let {} = {}; {}", name, val, body),
        }
    }
}
