pub mod upload_document_route;
