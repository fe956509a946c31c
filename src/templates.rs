use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, html};

use crate::{
    entities::{genre, user},
    models::{FormErrors, MovieForm, MovieView, Rating},
    repository::NavItem,
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

const INPUT_CLASS: &str = "mt-2 w-full rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500";

/// What every catalog page shows around its content.
pub struct Chrome<'a> {
    pub user: Option<&'a user::Model>,
    pub movies: &'a [NavItem],
}

pub fn movie_list(chrome: &Chrome<'_>, movies: &[MovieView]) -> String {
    page(
        "Movies",
        chrome,
        html! {
            div class="flex items-start justify-between gap-6" {
                h1 class="text-3xl font-bold text-gray-900" { "Movies" }
                @if chrome.user.is_some_and(|u| u.is_admin()) {
                    a class="rounded-md bg-blue-600 px-4 py-2 text-sm font-semibold text-white hover:bg-blue-700" href="/admin/movies/new" { "Add a movie" }
                }
            }

            @if movies.is_empty() {
                div class="mt-10 bg-white shadow rounded-lg p-8" {
                    p class="text-gray-600" { "The catalog is empty." }
                }
            } @else {
                div class="mt-10 space-y-4" {
                    @for movie in movies {
                        (movie_card(movie))
                    }
                }
            }
        },
    )
}

pub fn movie_details(chrome: &Chrome<'_>, movie: &MovieView, can_edit: bool) -> String {
    page(
        &movie.title,
        chrome,
        html! {
            div class="bg-white shadow rounded-lg p-8" {
                div class="flex items-start gap-8" {
                    (poster(movie))
                    div class="flex-1" {
                        h1 class="text-3xl font-bold text-gray-900" {
                            (movie.title)
                            span class="ml-2 font-normal text-gray-500" { "(" (movie.year()) ")" }
                        }
                        p class="mt-2 text-sm text-gray-500" {
                            (rating_badge(movie.rated))
                            " · released " (movie.released_at.strftime("%Y-%m-%d"))
                            @if !movie.genres.is_empty() {
                                " · " (movie.genres.join(", "))
                            }
                        }
                        p class="mt-6 text-gray-700" { (movie.plot) }

                        div class="mt-6 flex gap-4 text-sm" {
                            @if let Some(imdb_id) = &movie.imdb_id {
                                a class="text-blue-600 hover:text-blue-800" href=(format!("https://www.imdb.com/title/{imdb_id}/")) target="_blank" rel="noopener noreferrer" { "IMDb" }
                            }
                            @if can_edit {
                                a class="text-blue-600 hover:text-blue-800" href=(format!("/admin/movies/{}/edit", movie.slug)) { "Edit" }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn movie_form(
    chrome: &Chrome<'_>,
    form: &MovieForm,
    errors: &FormErrors,
    genres: &[genre::Model],
    heading: &str,
    action: &str,
) -> String {
    page(
        heading,
        chrome,
        html! {
            div class="bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { (heading) }

                form class="mt-8 space-y-6" method="post" action=(action) {
                    (text_field("slug", "Slug", &form.slug, errors))
                    (text_field("title", "Title", &form.title, errors))

                    div {
                        label class="block text-sm font-medium text-gray-700" for="released_at" { "Release date" }
                        input class=(INPUT_CLASS) type="date" name="released_at" id="released_at" value=(form.released_at);
                        (field_error("released_at", errors))
                    }

                    div {
                        label class="block text-sm font-medium text-gray-700" for="plot" { "Plot" }
                        textarea class=(INPUT_CLASS) name="plot" id="plot" rows="6" { (form.plot) }
                        (field_error("plot", errors))
                    }

                    fieldset {
                        legend class="block text-sm font-medium text-gray-700" { "Rating" }
                        div class="mt-2 flex gap-4" {
                            @for rating in [Rating::GeneralAudiences, Rating::ParentalGuidance, Rating::ParentsStronglyCautioned, Rating::Restricted, Rating::AdultsOnly] {
                                label class="text-sm text-gray-700" {
                                    input type="radio" name="rated" value=(rating.as_code()) checked[form.rated == rating.as_code()];
                                    " " (rating.as_code())
                                }
                            }
                        }
                        (field_error("rated", errors))
                    }

                    (text_field("poster", "Poster", &form.poster, errors))

                    fieldset {
                        legend class="block text-sm font-medium text-gray-700" { "Genres" }
                        div class="mt-2 grid grid-cols-3 gap-2" {
                            @for genre in genres {
                                label class="text-sm text-gray-700" {
                                    input type="checkbox" name="genres" value=(genre.id) checked[form.genres.contains(&genre.id)];
                                    " " (genre.name)
                                }
                            }
                        }
                        (field_error("genres", errors))
                    }

                    button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Save" }
                }
            }
        },
    )
}

pub fn login_page(chrome: &Chrome<'_>, username: &str, error: Option<&str>) -> String {
    page(
        "Log in",
        chrome,
        html! {
            div class="max-w-md mx-auto bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { "Log in" }
                @if let Some(error) = error {
                    p class="mt-4 rounded-md bg-red-50 px-3 py-2 text-sm text-red-700" { (error) }
                }
                form class="mt-6 space-y-6" method="post" action="/login" {
                    div {
                        label class="block text-sm font-medium text-gray-700" for="username" { "Username" }
                        input class=(INPUT_CLASS) name="username" id="username" value=(username) required;
                    }
                    div {
                        label class="block text-sm font-medium text-gray-700" for="password" { "Password" }
                        input class=(INPUT_CLASS) type="password" name="password" id="password" required;
                    }
                    button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Log in" }
                }
            }
        },
    )
}

pub fn error_page(status: StatusCode, message: String) -> String {
    document(
        status.canonical_reason().unwrap_or("Error"),
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/movies" { "Back to the catalog" }
                    }
                }
            }
        },
    )
}

fn page(title: &str, chrome: &Chrome<'_>, content: Markup) -> String {
    document(
        title,
        html! {
            div class="min-h-screen bg-gray-50" {
                (navbar(chrome))
                div class="max-w-4xl mx-auto px-6 py-10" { (content) }
            }
        },
    )
}

fn document(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " · Cinémathèque" }
                script src=(TAILWIND_CDN) {}
            }
            body { (body) }
        }
    }
    .into_string()
}

fn navbar(chrome: &Chrome<'_>) -> Markup {
    html! {
        nav class="bg-white shadow" {
            div class="max-w-4xl mx-auto px-6 py-4 flex items-center justify-between gap-6" {
                a class="text-lg font-bold text-gray-900" href="/movies" { "Cinémathèque" }

                @if !chrome.movies.is_empty() {
                    details class="relative text-sm" {
                        summary class="cursor-pointer text-gray-700" { "Movies" }
                        ul class="absolute z-10 mt-2 w-64 rounded-md bg-white shadow-lg py-2" {
                            @for item in chrome.movies {
                                li { a class="block px-4 py-1 text-gray-700 hover:bg-gray-100" href=(format!("/movies/{}", item.slug)) { (item.title) } }
                            }
                        }
                    }
                }

                div class="ml-auto text-sm" {
                    @if let Some(user) = chrome.user {
                        form class="flex items-center gap-3" method="post" action="/logout" {
                            span class="text-gray-600" { (user.username) }
                            button class="text-blue-600 hover:text-blue-800" type="submit" { "Log out" }
                        }
                    } @else {
                        a class="text-blue-600 hover:text-blue-800" href="/login" { "Log in" }
                    }
                }
            }
        }
    }
}

fn movie_card(movie: &MovieView) -> Markup {
    html! {
        div class="bg-white shadow rounded-lg p-6" {
            div class="flex items-start justify-between gap-4" {
                div {
                    h2 class="text-xl font-semibold text-gray-900" {
                        a class="hover:text-blue-700" href=(format!("/movies/{}", movie.slug)) { (movie.title) }
                        span class="ml-2 font-normal text-gray-500" { "(" (movie.year()) ")" }
                    }
                    @if !movie.genres.is_empty() {
                        p class="mt-1 text-sm text-gray-500" { (movie.genres.join(", ")) }
                    }
                }
                (rating_badge(movie.rated))
            }
        }
    }
}

fn poster(movie: &MovieView) -> Markup {
    html! {
        @if movie.is_remote_poster() {
            img class="w-40 rounded-md shadow" src=(movie.poster) alt=(movie.title);
        } @else {
            div class="w-40 h-60 rounded-md bg-gray-200 flex items-center justify-center text-xs text-gray-500" { (movie.poster) }
        }
    }
}

fn rating_badge(rated: Rating) -> Markup {
    let color = match rated.min_age() {
        None => "bg-green-100 text-green-800",
        Some(age) if age < 17 => "bg-yellow-100 text-yellow-800",
        Some(_) => "bg-red-100 text-red-800",
    };
    html! {
        span class=(format!("rounded px-2 py-0.5 text-xs font-semibold {color}")) { (rated.as_code()) }
    }
}

fn text_field(name: &'static str, label: &str, value: &str, errors: &FormErrors) -> Markup {
    html! {
        div {
            label class="block text-sm font-medium text-gray-700" for=(name) { (label) }
            input class=(INPUT_CLASS) name=(name) id=(name) value=(value);
            (field_error(name, errors))
        }
    }
}

fn field_error(name: &str, errors: &FormErrors) -> Markup {
    html! {
        @if let Some(message) = errors.get(name) {
            p class="mt-2 text-sm text-red-600" { (message) }
        }
    }
}
