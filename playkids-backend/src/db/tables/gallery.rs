//! Gallery photo metadata. Files themselves live under the upload directory.

use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_timestamp, now_str};
use crate::db::Database;
use crate::models::{GalleryItem, UpdateGalleryItemRequest};

const GALLERY_COLUMNS: &str = "id, title, description, album, filename, content_type, size_bytes,
    published, uploaded_by, created_at, updated_at";

fn row_to_item(row: &Row) -> SqliteResult<GalleryItem> {
    Ok(GalleryItem {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        album: row.get(3)?,
        filename: row.get(4)?,
        content_type: row.get(5)?,
        size_bytes: row.get(6)?,
        published: row.get::<_, i64>(7)? != 0,
        uploaded_by: row.get(8)?,
        created_at: get_timestamp(row, 9)?,
        updated_at: get_timestamp(row, 10)?,
    })
}

/// Fields of a freshly stored upload
#[derive(Debug, Clone)]
pub struct NewGalleryItem<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub album: Option<&'a str>,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub published: bool,
    pub uploaded_by: i64,
}

impl Database {
    pub fn create_gallery_item(&self, item: &NewGalleryItem) -> SqliteResult<GalleryItem> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO gallery_items (title, description, album, filename, content_type,
                    size_bytes, published, uploaded_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                rusqlite::params![
                    item.title,
                    item.description,
                    item.album,
                    item.filename,
                    item.content_type,
                    item.size_bytes,
                    item.published as i64,
                    item.uploaded_by,
                    now_str()
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_gallery_item(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_gallery_item(&self, id: i64) -> SqliteResult<Option<GalleryItem>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM gallery_items WHERE id = ?1", GALLERY_COLUMNS),
            [id],
            row_to_item,
        )
        .optional()
    }

    pub fn list_gallery_items(&self, album: Option<&str>, published_only: bool) -> SqliteResult<Vec<GalleryItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM gallery_items
             WHERE (?1 IS NULL OR album = ?1) AND (?2 = 0 OR published = 1)
             ORDER BY created_at DESC, id DESC",
            GALLERY_COLUMNS
        ))?;
        let items = stmt
            .query_map(rusqlite::params![album, published_only as i64], row_to_item)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    pub fn update_gallery_item(
        &self,
        id: i64,
        req: &UpdateGalleryItemRequest,
    ) -> SqliteResult<Option<GalleryItem>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE gallery_items SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    album = COALESCE(?4, album),
                    published = COALESCE(?5, published),
                    updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    req.title,
                    req.description,
                    req.album,
                    req.published.map(|p| p as i64),
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_gallery_item(id)
    }

    /// Delete the row and return it so the caller can remove the file.
    pub fn delete_gallery_item(&self, id: i64) -> SqliteResult<Option<GalleryItem>> {
        let Some(item) = self.get_gallery_item(id)? else {
            return Ok(None);
        };
        let conn = self.conn()?;
        conn.execute("DELETE FROM gallery_items WHERE id = ?1", [id])?;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::NewGalleryItem;
    use crate::db::open_temp;
    use crate::models::{Role, UpdateGalleryItemRequest};

    #[test]
    fn test_unpublished_hidden_from_public_listing() {
        let (_dir, db) = open_temp();
        let t = db.create_user("t@example.com", "h", "Tess Teacher", None, Role::Teacher).unwrap();
        let item = db
            .create_gallery_item(&NewGalleryItem {
                title: "Autumn walk",
                description: None,
                album: Some("autumn"),
                filename: "a.jpg",
                content_type: "image/jpeg",
                size_bytes: 1024,
                published: false,
                uploaded_by: t.id,
            })
            .unwrap();

        assert!(db.list_gallery_items(None, true).unwrap().is_empty());
        assert_eq!(db.list_gallery_items(Some("autumn"), false).unwrap().len(), 1);

        let req = UpdateGalleryItemRequest {
            title: None,
            description: None,
            album: None,
            published: Some(true),
        };
        let updated = db.update_gallery_item(item.id, &req).unwrap().unwrap();
        assert!(updated.published);
        assert_eq!(updated.title, "Autumn walk");
        assert_eq!(db.list_gallery_items(None, true).unwrap().len(), 1);

        let removed = db.delete_gallery_item(item.id).unwrap().unwrap();
        assert_eq!(removed.filename, "a.jpg");
        assert!(db.delete_gallery_item(item.id).unwrap().is_none());
    }
}
