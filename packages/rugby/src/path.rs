//! Path types tailored to `rugby`.
//!
//! ## Rationale
//!
//! Plain `std::path::{Path, PathBuf}` doesn't distinguish absolute from
//! relative, or files from directories, at the type level — every function
//! that takes a path ends up re-deriving "is this actually absolute?" at
//! runtime, or worse, assuming it and being wrong on some caller's machine.
//! [`TypedPath`] carries that distinction in its type so it's checked once,
//! at construction, instead of scattered through every consumer.
//!
//! ## Path Normalization
//!
//! This type does NOT perform path normalization. Paths are stored exactly
//! as provided by the caller. In particular:
//! - `some/path` and `some/path/` are NOT considered equivalent.
//! - `some/path/../other` and `some/other` are NOT considered equivalent.
//! - On Windows, `some\path` and `some/path` are NOT considered equivalent
//!   (though the OS treats them the same).
//!
//! If the caller cares about true normalization, normalize before passing
//! into this module.

use std::{
    any::type_name,
    borrow::Cow,
    ffi::{OsStr, OsString},
    marker::PhantomData,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use color_eyre::{
    Report, Result,
    eyre::{Context, bail},
};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tap::Pipe;

use crate::fs;

pub type RelFilePath = TypedPath<Rel, File>;
pub type RelDirPath = TypedPath<Rel, Dir>;
pub type RelSomePath = TypedPath<Rel, SomeType>;
pub type AbsFilePath = TypedPath<Abs, File>;
pub type AbsDirPath = TypedPath<Abs, Dir>;
pub type AbsSomePath = TypedPath<Abs, SomeType>;
pub type SomeDirPath = TypedPath<SomeBase, Dir>;
pub type SomeFilePath = TypedPath<SomeBase, File>;
pub type GenericPath = TypedPath<SomeBase, SomeType>;

/// Make an instance of a [`TypedPath<Rel, File>`] with a debug-time check
/// that the literal looks relative.
///
/// ```
/// use rugby::path::mk_rel_file;
///
/// let file = mk_rel_file!("src/main.rs");
/// assert_eq!(file.as_std_path().to_str(), Some("src/main.rs"));
/// ```
#[macro_export]
macro_rules! mk_rel_file {
    ($path:literal) => {{
        debug_assert!(!$path.starts_with('/'), "path is not relative: {}", $path);
        $crate::path::RelFilePath::try_from($path).unwrap()
    }};
}

/// Make an instance of a [`TypedPath<Rel, Dir>`] with a debug-time check
/// that the literal looks relative.
///
/// ```
/// use rugby::path::mk_rel_dir;
///
/// let dir = mk_rel_dir!("src");
/// assert_eq!(dir.as_std_path().to_str(), Some("src"));
/// ```
#[macro_export]
macro_rules! mk_rel_dir {
    ($path:literal) => {{
        debug_assert!(!$path.starts_with('/'), "path is not relative: {}", $path);
        $crate::path::RelDirPath::try_from($path).unwrap()
    }};
}

/// Indicates an unknown value for this path base.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SomeBase;

/// Indicates an unknown value for this type of path.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SomeType;

/// An absolute path always begins from the absolute start of the filesystem
/// and describes every step through the filesystem to end up at the target.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Abs;

/// A relative path is a "partial" path; it describes a path starting from
/// an undefined point. Once the "starting location" is given, the relative
/// path can take over, describing where to go from that location.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Rel;

/// A directory contains other file system entities,
/// such as files or other directories.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Dir;

/// A file contains data.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct File;

/// A location on the file system according to the type modifiers.
///
/// This type is about _intent_ within the working program; it does not
/// actually validate that given resources on disk exist or are the correct
/// type. Validating eagerly is prone to TOCTOU races and makes it hard to
/// construct paths meant to name things that don't exist yet. If you do
/// want to check, see [`TypedPath::exists`] (same caveats apply).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
#[display("{}", self.inner.display())]
pub struct TypedPath<Base, Type> {
    base: PhantomData<Base>,
    ty: PhantomData<Type>,
    inner: PathBuf,
}

impl<B, T> TypedPath<B, T> {
    /// View the path as a standard path.
    pub fn as_std_path(&self) -> &std::path::Path {
        &self.inner
    }

    /// View the path as a lossily-converted string.
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        self.inner.to_string_lossy()
    }

    /// View the path as an OS string.
    pub fn as_os_str(&self) -> &OsStr {
        self.inner.as_os_str()
    }

    /// Get the parent of the provided path, if one exists.
    ///
    /// Unlike the standard library, this method returns `None` if you
    /// request the parent of a relative path with one component.
    pub fn parent(&self) -> Option<TypedPath<B, Dir>> {
        self.inner
            .parent()
            .and_then(|p| if p.as_os_str().is_empty() { None } else { Some(p) })
            .map(ToOwned::to_owned)
            .map(TypedPath::new_unchecked)
    }

    /// Iterate through the components of the path.
    pub fn components<'a>(&'a self) -> impl DoubleEndedIterator<Item = Component<'a>> {
        self.inner.components()
    }

    /// Iterate through the components of the path as lossily-converted strings.
    pub fn component_strs_lossy<'a>(&'a self) -> impl DoubleEndedIterator<Item = Cow<'a, str>> {
        self.inner.components().map(|c| c.as_os_str().to_string_lossy())
    }

    /// Returns the final component of the path, if there is one.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.inner.file_name()
    }

    /// Returns the final component of the path, if there is one, as a
    /// lossily-converted string.
    pub fn file_name_str_lossy(&self) -> Option<Cow<'_, str>> {
        self.inner.file_name().map(|s| s.to_string_lossy())
    }

    fn new_unchecked(inner: impl Into<PathBuf>) -> Self {
        Self {
            base: PhantomData,
            ty: PhantomData,
            inner: inner.into(),
        }
    }
}

macro_rules! impl_try_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<B: Validator, T: Validator> TryFrom<$ty> for TypedPath<B, T> {
                type Error = Report;

                fn try_from(value: $ty) -> std::result::Result<Self, Self::Error> {
                    let value = PathBuf::from(value);
                    B::validate(&value).with_context(|| format!("validate base {:?}", B::type_name()))?;
                    T::validate(&value).with_context(|| format!("validate type {:?}", T::type_name()))?;
                    Ok(Self::new_unchecked(value))
                }
            }
        )*
    };
}

impl_try_from!(PathBuf, &PathBuf, &Path, String, &String, &str, OsString, &OsString, &OsStr);

impl<B: Validator, T: Validator> FromStr for TypedPath<B, T> {
    type Err = Report;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl<B, T> AsRef<TypedPath<B, T>> for TypedPath<B, T> {
    fn as_ref(&self) -> &TypedPath<B, T> {
        self
    }
}

impl<B, T> From<TypedPath<B, T>> for std::path::PathBuf {
    fn from(value: TypedPath<B, T>) -> Self {
        value.inner
    }
}

impl<B, T> From<&TypedPath<B, T>> for std::path::PathBuf {
    fn from(value: &TypedPath<B, T>) -> Self {
        value.inner.clone()
    }
}

impl<B: Clone, T: Clone> From<&TypedPath<B, T>> for TypedPath<B, T> {
    fn from(value: &TypedPath<B, T>) -> Self {
        value.clone()
    }
}

impl TypedPath<Abs, Dir> {
    /// Get the current working directory for the process.
    pub fn current() -> Result<TypedPath<Abs, Dir>> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::try_from(cwd).context("convert")
    }
}

impl<'de, B: Validator, T: Validator> Deserialize<'de> for TypedPath<B, T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = PathBuf::deserialize(deserializer)?;
        Self::try_from(p).map_err(serde::de::Error::custom)
    }
}

impl<B, T> Serialize for TypedPath<B, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl<B, T> std::fmt::Debug for TypedPath<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypedPath::<{}, {}>::({:?})", type_name::<B>(), type_name::<T>(), self.inner)
    }
}

impl<B> TypedPath<B, File> {
    /// Validate that the item exists on disk and is a file.
    ///
    /// Returns false if the item does not exist or there is an error
    /// checking. Prone to TOCTOU races like any such check.
    pub async fn exists(&self) -> bool {
        fs::is_file(self.as_std_path()).await
    }
}

impl<B> TypedPath<B, Dir> {
    /// Validate that the item exists on disk and is a directory.
    pub async fn exists(&self) -> bool {
        fs::is_dir(self.as_std_path()).await
    }
}

impl<B> TypedPath<B, SomeType> {
    /// Validate that the item exists on disk, of any type.
    pub async fn exists(&self) -> bool {
        fs::exists(self.as_std_path()).await
    }
}

impl<B: Clone, T: Clone> TypedPath<B, T> {
    /// Convert the type to a generic path, erasing its base/type markers.
    pub fn as_generic(&self) -> TypedPath<SomeBase, SomeType> {
        TypedPath::<SomeBase, SomeType>::new_unchecked(&self.inner)
    }
}

impl<B, T> TypedPath<B, T> {
    /// Try to convert into an absolute directory path.
    pub fn try_as_abs_dir(&self) -> Result<TypedPath<Abs, Dir>> {
        TypedPath::<Abs, Dir>::try_from(&self.inner)
    }

    /// Try to convert into an absolute file path.
    pub fn try_as_abs_file(&self) -> Result<TypedPath<Abs, File>> {
        TypedPath::<Abs, File>::try_from(&self.inner)
    }

    /// Try to convert into a relative directory path.
    pub fn try_as_rel_dir(&self) -> Result<TypedPath<Rel, Dir>> {
        TypedPath::<Rel, Dir>::try_from(&self.inner)
    }

    /// Try to convert into a relative file path.
    pub fn try_as_rel_file(&self) -> Result<TypedPath<Rel, File>> {
        TypedPath::<Rel, File>::try_from(&self.inner)
    }

    /// Try to convert into an absolute directory path, promoting a relative
    /// path using the process's current working directory if needed.
    pub fn try_as_abs_dir_using_cwd(&self) -> Result<TypedPath<Abs, Dir>> {
        if let Ok(p) = TypedPath::<Abs, Dir>::try_from(&self.inner) {
            return Ok(p);
        }
        let cwd = AbsDirPath::current()?;
        TypedPath::<Abs, Dir>::try_from(cwd.inner.join(&self.inner))
    }

    /// Try to convert into an absolute file path, promoting a relative path
    /// using the process's current working directory if needed.
    pub fn try_as_abs_file_using_cwd(&self) -> Result<TypedPath<Abs, File>> {
        if let Ok(p) = TypedPath::<Abs, File>::try_from(&self.inner) {
            return Ok(p);
        }
        let cwd = AbsDirPath::current()?;
        TypedPath::<Abs, File>::try_from(cwd.inner.join(&self.inner))
    }
}

/// Functionality for making a path relative using a base path.
pub trait RelativeTo<Other> {
    type Output;

    /// Make `self` relative to `other` if possible.
    fn relative_to(&self, other: Other) -> Self::Output;
}

macro_rules! impl_relative_to {
    ($($other:ty),* $(,)?) => {
        $(
            impl RelativeTo<$other> for TypedPath<Abs, Dir> {
                type Output = Result<TypedPath<Rel, Dir>>;
                fn relative_to(&self, other: $other) -> Self::Output {
                    self.inner
                        .strip_prefix(&other.inner)
                        .with_context(|| format!("make {:?} relative to {:?}", other.inner, self.inner))
                        .and_then(TypedPath::try_from)
                }
            }
            impl RelativeTo<$other> for TypedPath<Abs, File> {
                type Output = Result<TypedPath<Rel, File>>;
                fn relative_to(&self, other: $other) -> Self::Output {
                    self.inner
                        .strip_prefix(&other.inner)
                        .with_context(|| format!("make {:?} relative to {:?}", other.inner, self.inner))
                        .and_then(TypedPath::try_from)
                }
            }
            impl RelativeTo<$other> for TypedPath<Abs, SomeType> {
                type Output = Result<TypedPath<Rel, SomeType>>;
                fn relative_to(&self, other: $other) -> Self::Output {
                    self.inner
                        .strip_prefix(&other.inner)
                        .with_context(|| format!("make {:?} relative to {:?}", other.inner, self.inner))
                        .and_then(TypedPath::try_from)
                }
            }
        )*
    };
}

impl_relative_to!(
    TypedPath<Abs, Dir>,
    &TypedPath<Abs, Dir>,
    TypedPath<Abs, File>,
    &TypedPath<Abs, File>,
    TypedPath<Abs, SomeType>,
    &TypedPath<Abs, SomeType>,
);

/// Creates and joins a path from string segments, validating the result.
pub trait TryJoinWith {
    /// Join `dir` to `self` as a directory.
    fn try_join_dir(&self, dir: impl AsRef<str>) -> Result<AbsDirPath>;

    /// Join `file` to `self` as a file.
    fn try_join_file(&self, file: impl AsRef<str>) -> Result<AbsFilePath>;

    /// Join multiple directories to `self`. The overall path is checked once
    /// at the end instead of piece by piece.
    fn try_join_dirs(&self, dirs: impl IntoIterator<Item = impl AsRef<str>>) -> Result<AbsDirPath>;

    /// Join multiple directories, followed by a file, to `self`.
    fn try_join_combined(
        &self,
        dirs: impl IntoIterator<Item = impl AsRef<str>>,
        file: impl AsRef<str>,
    ) -> Result<AbsFilePath>;
}

impl TryJoinWith for TypedPath<Abs, Dir> {
    fn try_join_dir(&self, other: impl AsRef<str>) -> Result<AbsDirPath> {
        self.inner.join(other.as_ref()).pipe(AbsDirPath::try_from)
    }

    fn try_join_file(&self, other: impl AsRef<str>) -> Result<AbsFilePath> {
        self.inner.join(other.as_ref()).pipe(AbsFilePath::try_from)
    }

    fn try_join_dirs(&self, dirs: impl IntoIterator<Item = impl AsRef<str>>) -> Result<AbsDirPath> {
        let mut inner = self.inner.clone();
        for other in dirs {
            inner = inner.join(other.as_ref());
        }
        AbsDirPath::try_from(inner)
    }

    fn try_join_combined(
        &self,
        dirs: impl IntoIterator<Item = impl AsRef<str>>,
        file: impl AsRef<str>,
    ) -> Result<AbsFilePath> {
        let mut inner = self.inner.clone();
        for other in dirs {
            inner = inner.join(other.as_ref());
        }
        inner.join(file.as_ref()).pipe(AbsFilePath::try_from)
    }
}

/// Infallibly joins known-valid paths together.
pub trait JoinWith<Other> {
    type Output;

    /// Join `other` to `self`.
    fn join(&self, other: Other) -> Self::Output;
}

macro_rules! impl_join_with {
    ($($other:ty => $out:ty),* $(,)?) => {
        $(
            impl JoinWith<$other> for TypedPath<Abs, Dir> {
                type Output = $out;

                fn join(&self, other: $other) -> Self::Output {
                    self.as_std_path().join(other.as_std_path()).pipe(TypedPath::new_unchecked)
                }
            }
        )*
    };
}

impl_join_with!(
    TypedPath<Rel, Dir> => TypedPath<Abs, Dir>,
    &TypedPath<Rel, Dir> => TypedPath<Abs, Dir>,
    TypedPath<Rel, File> => TypedPath<Abs, File>,
    &TypedPath<Rel, File> => TypedPath<Abs, File>,
);

/// Fallible methods on [`TypedPath`] variants are powered by instances of
/// the `Validator` trait on the `Base` and `Type` generics.
pub trait Validator {
    /// Validate that the inner path for a [`TypedPath`] type matches
    /// the constraints of the validator, or return an error.
    fn validate(path: &Path) -> Result<()>;

    /// The name of the validator, for use in error messages.
    fn type_name() -> &'static str {
        core::any::type_name::<Self>()
    }
}

impl Validator for Rel {
    fn validate(path: &Path) -> Result<()> {
        if !path.is_relative() {
            bail!("path is not relative: {path:?}");
        }
        Ok(())
    }
}

impl Validator for Abs {
    fn validate(path: &Path) -> Result<()> {
        if !path.is_absolute() {
            bail!("path is not absolute: {path:?}");
        }
        Ok(())
    }
}

macro_rules! impl_noop_validator {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Validator for $ty {
                fn validate(_: &Path) -> Result<()> {
                    Ok(())
                }
            }
        )*
    };
}

impl_noop_validator!(Dir, File, SomeType, SomeBase);
