use crate::context::CallContext;
use crate::error::Result;
use crate::path::ResourcePath;
use crate::response::Lookup;
use crate::context::Reply;
use crate::session::{Call, Session};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

impl Session {
    /// Read a resource and return the raw body.
    ///
    /// A missing object is reported as a `NotFound` error.
    pub fn get(&self, cx: &CallContext, path: &ResourcePath) -> Result<Vec<u8>> {
        Ok(self.send(cx, Method::GET, path, None)?.body)
    }

    /// Read a resource and decode it; a missing object is an error
    pub fn get_json<T>(&self, cx: &CallContext, path: &ResourcePath) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.get(cx, path)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read one object, reporting absence as [`Lookup::NotFound`] rather than
    /// an error. No value is decoded for a missing object.
    pub fn get_for_entity<T>(&self, cx: &CallContext, path: &ResourcePath) -> Result<Lookup<T>>
    where
        T: DeserializeOwned,
    {
        match self.get(cx, path) {
            Ok(body) => Ok(Lookup::Found(serde_json::from_slice(&body)?)),
            Err(e) if e.is_not_found() => Ok(Lookup::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Create an object. A duplicate name surfaces as a `Conflict` error.
    pub fn post<P>(&self, cx: &CallContext, path: &ResourcePath, payload: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.send_json(cx, Method::POST, path, payload)?;
        Ok(())
    }

    /// Replace an object
    pub fn put<P>(&self, cx: &CallContext, path: &ResourcePath, payload: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.send_json(cx, Method::PUT, path, payload)?;
        Ok(())
    }

    /// Partially update an object.
    ///
    /// The payload is sent as-is; only fields the appliance treats as mutable
    /// should be set.
    pub fn patch<P>(&self, cx: &CallContext, path: &ResourcePath, payload: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.send_json(cx, Method::PATCH, path, payload)?;
        Ok(())
    }

    /// Delete an object. A missing object surfaces as a `NotFound` error.
    pub fn delete(&self, cx: &CallContext, path: &ResourcePath) -> Result<()> {
        self.send(cx, Method::DELETE, path, None)?;
        Ok(())
    }

    fn send_json<P>(&self, cx: &CallContext, method: Method, path: &ResourcePath, payload: &P) -> Result<Reply>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        self.send(cx, method, path, Some(body))
    }

    fn send(&self, cx: &CallContext, method: Method, path: &ResourcePath, body: Option<Vec<u8>>) -> Result<Reply> {
        let mut headers = HeaderMap::new();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let call = Call {
            method,
            url: self.url(path)?,
            headers,
            body,
        };
        self.execute(cx, &call)
    }
}
