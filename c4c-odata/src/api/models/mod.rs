//! Entity and response models plus the hydration layer

pub mod edm;
pub mod entity;
pub mod hydrate;
pub mod response;
pub mod result;

pub use entity::{
    DeferredNavigationProperty, DeferredUri, Entity, EntityMetadata, NavigationProperty,
    ODataEntity,
};
pub use hydrate::{from_plain_object, from_request_result};
pub use response::{
    ErrorMessage, PlainODataResponse, PlainODataResponseV4, ResponseData, ServerErrorBody,
};
pub use result::{CollectionResult, SingleResult};
