//! Memoized analysis of one loaded binary.
//!
//! [`AnalysisSession`] borrows a [`CodeContainer`] and caches every derived fact for as
//! long as it lives. Each cached value is computed at most once, also when the session is
//! shared between threads: the located methods sit in a [`OnceLock`], and instruction
//! catalogs sit in per-type [`OnceLock`] cells inside a [`DashMap`].

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::Serialize;

use crate::{
    devirtualization::{
        catalog::{build_catalog, VirtualInstruction},
        config::AnalysisConfig,
        locator::{find_first_virtualized_method, find_virtualized_methods, VirtualizedMethod},
        position::decode_position,
        signatures::SignatureCatalog,
    },
    metadata::{cilmodule::CilModule, container::CodeContainer, token::Token},
    Error::{CatalogUnavailable, TypeNotFound},
    Result,
};

/// Where the bytecode of a virtualized method starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BytecodeLocation {
    /// Name of the resource holding the bytecode
    pub resource: String,
    /// Size of that resource, `None` if the binary does not embed it
    pub resource_len: Option<usize>,
    /// Decoded position
    pub position: i64,
    /// Whether the position lies inside the resource
    pub in_bounds: bool,
}

type CatalogCell = Arc<OnceLock<std::result::Result<Arc<Vec<VirtualInstruction>>, String>>>;

/// Analysis results for one immutable binary.
///
/// # Examples
///
/// ```rust,no_run
/// use vmscope::{AnalysisSession, CilModule};
///
/// let module = CilModule::from_file("protected.exe".as_ref())?;
/// let session = AnalysisSession::new(&module);
///
/// match session.module_key() {
///     Some(key) => println!("Key: {key} ({key:#X})"),
///     None => println!("No virtualized methods found."),
/// }
/// # Ok::<(), vmscope::Error>(())
/// ```
pub struct AnalysisSession<'a, C: CodeContainer + ?Sized = CilModule> {
    container: &'a C,
    config: AnalysisConfig,
    catalog: Arc<SignatureCatalog>,
    methods: OnceLock<Vec<VirtualizedMethod>>,
    first: OnceLock<Option<VirtualizedMethod>>,
    catalogs: DashMap<Token, CatalogCell>,
}

impl<'a, C: CodeContainer + ?Sized> AnalysisSession<'a, C> {
    /// A session with the default configuration and the built-in signature catalog.
    pub fn new(container: &'a C) -> Self {
        Self::with_options(
            container,
            AnalysisConfig::default(),
            SignatureCatalog::builtin(),
        )
    }

    /// A session with an explicit configuration and signature catalog.
    pub fn with_options(
        container: &'a C,
        config: AnalysisConfig,
        catalog: Arc<SignatureCatalog>,
    ) -> Self {
        AnalysisSession {
            container,
            config,
            catalog,
            methods: OnceLock::new(),
            first: OnceLock::new(),
            catalogs: DashMap::new(),
        }
    }

    /// The analyzed container.
    pub fn container(&self) -> &'a C {
        self.container
    }

    /// The configuration in use.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The signature catalog handlers are matched against.
    pub fn signatures(&self) -> &SignatureCatalog {
        &self.catalog
    }

    /// Every virtualized method in declaration order.
    pub fn virtualized_methods(&self) -> &[VirtualizedMethod] {
        self.methods
            .get_or_init(|| find_virtualized_methods(self.container, &self.config))
    }

    /// The first virtualized method in declaration order.
    ///
    /// Served from the full scan when it already ran, otherwise the scan stops at the first
    /// match.
    pub fn first_virtualized_method(&self) -> Option<&VirtualizedMethod> {
        if let Some(methods) = self.methods.get() {
            return methods.first();
        }

        self.first
            .get_or_init(|| find_first_virtualized_method(self.container, &self.config))
            .as_ref()
    }

    /// The module key, taken from the first virtualized method.
    pub fn module_key(&self) -> Option<i64> {
        self.first_virtualized_method().map(|method| method.key)
    }

    /// The instruction catalog of `interpreter_type`, computed once per type.
    ///
    /// A failure to list the handlers is cached as well and reported on every call.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `interpreter_type` is not a type definition
    /// of the binary, and [`crate::Error::CatalogUnavailable`] if its handlers could not be
    /// listed.
    pub fn instruction_catalog(
        &self,
        interpreter_type: Token,
    ) -> Result<Arc<Vec<VirtualInstruction>>> {
        if !self.container.is_type_definition(interpreter_type) {
            return Err(TypeNotFound(interpreter_type));
        }

        // Clone the cell out so the shard lock is not held while matching
        let cell = self.catalogs.entry(interpreter_type).or_default().clone();

        let instructions = cell.get_or_init(|| {
            build_catalog(self.container, interpreter_type, &self.catalog, &self.config)
                .map(Arc::new)
                .map_err(|error| {
                    log::warn!("Handlers of {interpreter_type} could not be listed - {error}");
                    error.to_string()
                })
        });

        match instructions {
            Ok(instructions) => Ok(instructions.clone()),
            Err(message) => Err(CatalogUnavailable {
                interpreter_type,
                message: message.clone(),
            }),
        }
    }

    /// Decode the position string of `method` with its key.
    ///
    /// # Errors
    /// Returns [`crate::Error::Format`] if the string is not a valid encoding.
    pub fn decode_position(&self, method: &VirtualizedMethod) -> Result<i64> {
        Ok(decode_position(&method.position, method.key)?)
    }

    /// Resolve where the bytecode of `method` starts inside its resource.
    ///
    /// # Errors
    /// Returns [`crate::Error::Format`] if the position string is not a valid encoding.
    pub fn bytecode(&self, method: &VirtualizedMethod) -> Result<BytecodeLocation> {
        let position = self.decode_position(method)?;
        let resource_len = self.container.resource(&method.resource).map(<[u8]>::len);
        let in_bounds = resource_len.is_some_and(|len| {
            usize::try_from(position).is_ok_and(|position| position < len)
        });

        Ok(BytecodeLocation {
            resource: method.resource.clone(),
            resource_len,
            position,
            in_bounds,
        })
    }
}
