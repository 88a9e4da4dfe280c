//! Version-addressed resources and their storage keys.
//!
//! A [`Resource`] is the four-tuple `(owner, kind, uuid, version)`. Every
//! backend derives the same object keys from it:
//!
//! - files: `<owner>/<kind>/<uuid>/<version>/<relative/path>`
//! - bundle: `<owner>/<kind>/<uuid>/<version>.zip`

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvalidResource;

/// A versioned tree of files owned by someone, e.g. a model or a world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Owning user or organization.
    pub owner: String,
    /// Resource kind, such as `"models"` or `"worlds"`.
    pub kind: String,
    /// RFC-4122 version 4 UUID, in its string form.
    pub uuid: String,
    /// Version number, starting at 1.
    pub version: u64,
}

impl Resource {
    /// Create a resource from its parts. No validation happens here.
    pub fn new(
        owner: impl Into<String>,
        kind: impl Into<String>,
        uuid: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            owner: owner.into(),
            kind: kind.into(),
            uuid: uuid.into(),
            version,
        }
    }

    /// Check the resource is addressable. Every storage operation calls this
    /// before touching any backend.
    pub fn validate(&self) -> Result<(), InvalidResource> {
        if self.owner.is_empty() {
            return Err(InvalidResource::MissingOwner);
        }
        if self.kind.is_empty() {
            return Err(InvalidResource::MissingKind);
        }
        match Uuid::parse_str(&self.uuid) {
            Ok(uuid) if uuid.get_version_num() == 4 => {}
            _ => return Err(InvalidResource::InvalidUuid),
        }
        if self.version == 0 {
            return Err(InvalidResource::InvalidVersion);
        }
        Ok(())
    }

    /// The key prefix `<owner>/<kind>/<uuid>/<version>`.
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}/{}", self.owner, self.kind, self.uuid, self.version)
    }

    /// The key of a file inside the resource. Leading slashes on `path` are ignored.
    ///
    /// `.` segments and repeated separators are dropped. Fails with
    /// [`InvalidResource::InvalidPath`] if nothing is left or `path` has
    /// `..`, root or drive components.
    pub fn file_key(&self, path: &str) -> Result<String, InvalidResource> {
        let mut parts = Vec::new();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy()),
                Component::CurDir => {}
                _ => return Err(InvalidResource::InvalidPath),
            }
        }
        if parts.is_empty() {
            return Err(InvalidResource::InvalidPath);
        }
        Ok(format!("{}/{}", self.prefix(), parts.join("/")))
    }

    /// The key of the resource's zip bundle, `<prefix>.zip`.
    pub fn zip_key(&self) -> String {
        format!("{}.zip", self.prefix())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "e6af5323-db4d-4db3-a402-a8992d6c8d99";

    fn turtle() -> Resource {
        Resource::new("OpenRobotics", "models", UUID, 1)
    }

    #[test]
    fn test_valid_resource() {
        assert_eq!(turtle().validate(), Ok(()));
    }

    #[test]
    fn test_missing_owner() {
        let r = Resource::new("", "models", UUID, 1);
        assert_eq!(r.validate(), Err(InvalidResource::MissingOwner));
    }

    #[test]
    fn test_missing_kind() {
        let r = Resource::new("OpenRobotics", "", UUID, 1);
        assert_eq!(r.validate(), Err(InvalidResource::MissingKind));
    }

    #[test]
    fn test_invalid_uuid() {
        let r = Resource::new("OpenRobotics", "models", "not-a-uuid", 1);
        assert_eq!(r.validate(), Err(InvalidResource::InvalidUuid));
    }

    #[test]
    fn test_uuid_must_be_v4() {
        // Version 1 (time based) UUID.
        let r = Resource::new(
            "OpenRobotics",
            "models",
            "c232ab00-9414-11ec-b3c8-9f6bdeced846",
            1,
        );
        assert_eq!(r.validate(), Err(InvalidResource::InvalidUuid));
    }

    #[test]
    fn test_zero_version() {
        let r = Resource::new("OpenRobotics", "models", UUID, 0);
        assert_eq!(r.validate(), Err(InvalidResource::InvalidVersion));
    }

    #[test]
    fn test_keys() {
        let r = turtle();
        assert_eq!(r.prefix(), format!("OpenRobotics/models/{UUID}/1"));
        assert_eq!(
            r.file_key("meshes/turtle.dae"),
            Ok(format!("OpenRobotics/models/{UUID}/1/meshes/turtle.dae"))
        );
        assert_eq!(
            r.file_key("/model.sdf"),
            Ok(format!("{}/model.sdf", r.prefix()))
        );
        assert_eq!(r.zip_key(), format!("OpenRobotics/models/{UUID}/1.zip"));
        assert_eq!(r.to_string(), r.prefix());
    }

    #[test]
    fn test_file_key_stays_inside_resource() {
        let r = turtle();
        for path in ["", "/", "..", "../model.sdf", "meshes/../../1.zip", "a/b/../../.."] {
            assert_eq!(r.file_key(path), Err(InvalidResource::InvalidPath), "{path}");
        }
        assert_eq!(
            r.file_key("./meshes//turtle.dae"),
            Ok(format!("{}/meshes/turtle.dae", r.prefix()))
        );
        assert!(r.file_key("meshes/..hidden.dae").is_ok());
    }

    #[test]
    fn test_resource_serialize() {
        let json = serde_json::to_string(&turtle()).unwrap();
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turtle());
    }
}
