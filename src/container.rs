//! Explicit dependency-injection container.
//!
//! Handlers and middleware are plain structs. Each one implements
//! [`Injectable`], listing the dependencies its constructor needs and how to
//! build itself from them. Nothing is discovered at runtime: the graph is the
//! union of those declarations, walked once when a type is registered.
//!
//! ```rust
//! use kiwi::{Container, Dependency, Injectable, ResolveError, Resolver};
//!
//! struct Clock;
//!
//! impl Injectable for Clock {
//!     fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> {
//!         Ok(Clock)
//!     }
//! }
//!
//! struct Greeter {
//!     clock: Clock,
//! }
//!
//! impl Injectable for Greeter {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::on::<Clock>()]
//!     }
//!
//!     fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
//!         Ok(Greeter { clock: deps.resolve()? })
//!     }
//! }
//!
//! let mut container = Container::new();
//! container.register::<Greeter>().unwrap(); // Clock is registered with it
//! let _fresh: Greeter = container.get_instance().unwrap();
//! ```
//!
//! # Lifetimes
//!
//! There is no caching. Every [`Container::get_instance`] call builds a new
//! instance tree, so two requests never share handler or middleware state.
//! Values handed to [`Container::provide`] are cloned per resolution; wrap
//! them in an `Arc` when sharing is what you want.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::error::RegistrationError;

/// A type the container knows how to build.
pub trait Injectable: Sized + Send + 'static {
    /// Constructor dependencies. Only types listed here may be resolved from
    /// inside [`construct`](Injectable::construct).
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Builds one instance, pulling declared dependencies from `deps`.
    fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError>;
}

/// Per-request resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{0}` is not registered")]
    Unregistered(&'static str),

    #[error("`{owner}` resolved `{dependency}` without declaring it")]
    Undeclared {
        owner: &'static str,
        dependency: &'static str,
    },

    #[error("registration for `{0}` produced a value of another type")]
    TypeMismatch(&'static str),

    /// Raised by [`Injectable::construct`] implementations.
    #[error("failed to construct `{owner}`: {message}")]
    Construct { owner: &'static str, message: String },
}

type Visit = (TypeId, &'static str);
type RegisterFn = fn(&mut Container, &mut Vec<Visit>) -> Result<(), RegistrationError>;
type Factory = Arc<dyn Fn(&Container) -> Result<Box<dyn Any + Send>, ResolveError> + Send + Sync>;

/// One edge of the dependency graph.
#[derive(Clone, Copy)]
pub struct Dependency {
    id: TypeId,
    name: &'static str,
    // `None` for provided values: they have no graph of their own.
    register: Option<RegisterFn>,
}

impl Dependency {
    /// Depends on another [`Injectable`] type. Registered automatically
    /// together with its owner.
    pub fn on<T: Injectable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            register: Some(Container::visit::<T>),
        }
    }

    /// Depends on a value supplied through [`Container::provide`].
    pub fn provided<T: Clone + Send + Sync + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            register: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dependency").field(&self.name).finish()
    }
}

struct Registration {
    name: &'static str,
    dependencies: Vec<Dependency>,
    factory: Factory,
}

/// The dependency graph and the factories that walk it.
#[derive(Default)]
pub struct Container {
    registrations: HashMap<TypeId, Registration>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` and, recursively, every [`Dependency::on`] it declares.
    ///
    /// Registering an already known type is a no-op. A declaration that
    /// leads back to a type still being registered fails with
    /// [`RegistrationError::Cycle`].
    pub fn register<T: Injectable>(&mut self) -> Result<(), RegistrationError> {
        let mut stack = Vec::new();
        Self::visit::<T>(self, &mut stack)
    }

    /// Makes `value` available to any type that declares
    /// [`Dependency::provided::<T>()`](Dependency::provided). Each resolution
    /// receives its own clone. Providing the same type twice replaces the
    /// earlier value.
    pub fn provide<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        let factory: Factory = Arc::new(move |_: &Container| -> Result<Box<dyn Any + Send>, ResolveError> {
            Ok(Box::new(value.clone()))
        });
        self.registrations.insert(
            TypeId::of::<T>(),
            Registration { name: type_name::<T>(), dependencies: Vec::new(), factory },
        );
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Checks that every declared dependency can be satisfied.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        for registration in self.registrations.values() {
            for dep in &registration.dependencies {
                if !self.registrations.contains_key(&dep.id) {
                    return Err(RegistrationError::Missing {
                        owner: registration.name,
                        dependency: dep.name,
                    });
                }
            }
        }
        Ok(())
    }

    /// Builds a brand-new `T`, constructing its dependencies first.
    pub fn get_instance<T: 'static>(&self) -> Result<T, ResolveError> {
        let registration = self
            .registrations
            .get(&TypeId::of::<T>())
            .ok_or(ResolveError::Unregistered(type_name::<T>()))?;
        let value = (registration.factory)(self)?;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| ResolveError::TypeMismatch(registration.name))
    }

    fn visit<T: Injectable>(
        container: &mut Container,
        stack: &mut Vec<Visit>,
    ) -> Result<(), RegistrationError> {
        let id = TypeId::of::<T>();
        let name = type_name::<T>();

        if let Some(start) = stack.iter().position(|(seen, _)| *seen == id) {
            let mut path: Vec<&'static str> = stack[start..].iter().map(|(_, n)| *n).collect();
            path.push(name);
            return Err(RegistrationError::Cycle(path));
        }
        if container.registrations.contains_key(&id) {
            return Ok(());
        }

        stack.push((id, name));
        let dependencies = T::dependencies();
        for dep in &dependencies {
            if let Some(register) = dep.register {
                register(container, stack)?;
            }
        }
        stack.pop();

        // Inserted only after the whole subgraph succeeded, so a type that
        // sits on a cycle is never left half-registered.
        container.registrations.insert(
            id,
            Registration { name, dependencies, factory: Arc::new(construct::<T>) },
        );
        Ok(())
    }

    fn registration<T: 'static>(&self) -> Result<&Registration, ResolveError> {
        self.registrations
            .get(&TypeId::of::<T>())
            .ok_or(ResolveError::Unregistered(type_name::<T>()))
    }
}

fn construct<T: Injectable>(container: &Container) -> Result<Box<dyn Any + Send>, ResolveError> {
    let registration = container.registration::<T>()?;
    let resolver = Resolver {
        container,
        owner: registration.name,
        declared: &registration.dependencies,
    };
    let instance = T::construct(&resolver)?;
    Ok(Box::new(instance))
}

/// Hands an [`Injectable`] the dependencies it declared, freshly built.
pub struct Resolver<'a> {
    container: &'a Container,
    owner: &'static str,
    declared: &'a [Dependency],
}

impl Resolver<'_> {
    /// Builds a declared dependency. Resolving a type the owner did not list
    /// in [`Injectable::dependencies`] is an error even when the container
    /// could build it; the declarations are what cycle detection checked.
    pub fn resolve<D: 'static>(&self) -> Result<D, ResolveError> {
        let id = TypeId::of::<D>();
        if !self.declared.iter().any(|dep| dep.id == id) {
            return Err(ResolveError::Undeclared {
                owner: self.owner,
                dependency: type_name::<D>(),
            });
        }
        self.container.get_instance::<D>()
    }

    /// Name of the type being constructed, for error messages.
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Leaf {
        serial: usize,
    }

    impl Injectable for Leaf {
        fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> {
            Ok(Leaf { serial: BUILT.fetch_add(1, Ordering::SeqCst) })
        }
    }

    struct Branch {
        leaf: Leaf,
        label: String,
    }

    impl Injectable for Branch {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::on::<Leaf>(), Dependency::provided::<String>()]
        }

        fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
            Ok(Branch { leaf: deps.resolve()?, label: deps.resolve()? })
        }
    }

    struct Ping;
    struct Pong;

    impl Injectable for Ping {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::on::<Pong>()]
        }
        fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
            deps.resolve::<Pong>()?;
            Ok(Ping)
        }
    }

    impl Injectable for Pong {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::on::<Ping>()]
        }
        fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
            deps.resolve::<Ping>()?;
            Ok(Pong)
        }
    }

    struct SelfLoop;

    impl Injectable for SelfLoop {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::on::<SelfLoop>()]
        }
        fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> {
            Ok(SelfLoop)
        }
    }

    struct Sneaky;

    impl Injectable for Sneaky {
        fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
            deps.resolve::<Leaf>()?;
            Ok(Sneaky)
        }
    }

    #[test]
    fn registers_dependencies_transitively() {
        let mut container = Container::new();
        container.register::<Branch>().unwrap();
        assert!(container.contains::<Branch>());
        assert!(container.contains::<Leaf>());
    }

    #[test]
    fn every_resolution_builds_a_fresh_tree() {
        let mut container = Container::new();
        container.provide(String::from("shared label"));
        container.register::<Branch>().unwrap();

        let first: Branch = container.get_instance().unwrap();
        let second: Branch = container.get_instance().unwrap();

        assert_ne!(first.leaf.serial, second.leaf.serial);
        assert_eq!(first.label, "shared label");
        assert_eq!(second.label, "shared label");
    }

    #[test]
    fn mutual_dependency_is_a_cycle() {
        let mut container = Container::new();
        let err = container.register::<Ping>().unwrap_err();
        match err {
            RegistrationError::Cycle(path) => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(!container.contains::<Ping>());
        assert!(!container.contains::<Pong>());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut container = Container::new();
        assert!(matches!(
            container.register::<SelfLoop>(),
            Err(RegistrationError::Cycle(_))
        ));
    }

    #[test]
    fn validate_reports_missing_provided_value() {
        let mut container = Container::new();
        container.register::<Branch>().unwrap();
        let err = container.validate().unwrap_err();
        assert!(matches!(err, RegistrationError::Missing { dependency, .. } if dependency.contains("String")));

        container.provide(String::new());
        container.validate().unwrap();
    }

    #[test]
    fn resolving_an_undeclared_dependency_fails() {
        let mut container = Container::new();
        container.register::<Leaf>().unwrap();
        container.register::<Sneaky>().unwrap();
        assert!(matches!(
            container.get_instance::<Sneaky>(),
            Err(ResolveError::Undeclared { .. })
        ));
    }

    #[test]
    fn unregistered_type_fails_to_resolve() {
        let container = Container::new();
        assert!(matches!(
            container.get_instance::<Leaf>(),
            Err(ResolveError::Unregistered(_))
        ));
    }
}
