#![forbid(unsafe_code)]

//! treebind public facade.
//!
//! Re-exports the observable model and, with the default `mapper` feature,
//! the tree synchronization engine. Most applications only need the
//! [`prelude`].
//!
//! ```
//! use std::rc::Rc;
//! use treebind::prelude::*;
//!
//! let title = Property::new("draft".to_string());
//! let shown = Property::new(String::new());
//!
//! let root = Mapper::new(Rc::new(()), ());
//! root.sync_one_way(&title, &shown);
//! root.attach_root().unwrap();
//!
//! title.set("final".to_string());
//! assert_eq!(shown.get(), "final");
//! ```

pub use treebind_model as model;

#[cfg(feature = "mapper")]
pub use treebind_mapper as mapper;

pub use treebind_model::{
    CollectionItemEvent, CollectionListener, EventKind, Identity, IdentityKey,
    ObservableCollection, ObservableList, ObservableListWrapper, ObservableSet,
    ObservableSetWrapper, Property, PropertyChangeEvent, Subscription,
};

#[cfg(feature = "mapper")]
pub use treebind_mapper::{
    ChildList, ChildSet, Mapper, MapperId, MapperRef, MapperState, MappingContext,
    MappingContextListener, MappingError, ObservableRole, RoleKind, SimpleRole, SingleChildRole,
};

/// Common imports.
pub mod prelude {
    pub use treebind_model::{
        CollectionItemEvent, EventKind, Identity, ObservableCollection, ObservableList,
        ObservableListWrapper, ObservableSet, ObservableSetWrapper, Property, Subscription,
    };

    #[cfg(feature = "mapper")]
    pub use treebind_mapper::{Mapper, MapperRef, MapperState, MappingContext, MappingError};
}
